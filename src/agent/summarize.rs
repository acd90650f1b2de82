//! Per-file summaries of a source tree, generated concurrently and cached
//! per commit.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use futures_util::stream::{self, StreamExt};
use regex::Regex;
use tracing::{debug, info, warn};

use super::prompts::{self, PromptError};
use crate::llm::ChatModel;

/// Java method headers: visibility, optional `static`, return type, name.
static METHOD_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(public|private|protected)\s+(static\s+)?[\w<>\[\]]+\s+(\w+)\s*\(.*?\)\s*\{")
        .unwrap()
});

/// Summaries keyed by path relative to the project root.
pub type Summaries = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error(transparent)]
    Listing(#[from] PromptError),

    #[error("failed to write summary cache {}: {source}", path.display())]
    Cache {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Method names declared in a source file, in order of appearance.
pub fn extract_functions(content: &str) -> Vec<String> {
    METHOD_HEADER
        .captures_iter(content)
        .map(|caps| caps[3].to_string())
        .collect()
}

/// Fill the summary template for one file.
pub fn summary_prompt(template: &str, file_path: &str, content: &str) -> String {
    let functions = extract_functions(content);
    let function_section = if functions.is_empty() {
        "No function definitions were detected; summarize the file body directly.\n".to_string()
    } else {
        let mut section = String::from("Function summaries: describe what each of these functions does:\n");
        for name in &functions {
            section.push_str(&format!("- {name}\n"));
        }
        section
    };
    prompts::render(
        template,
        &[
            ("file_path", file_path),
            ("function_section", &function_section),
            ("file_content", content),
        ],
    )
}

/// Summaries as one prompt section.
pub fn render_summaries(summaries: &Summaries) -> String {
    let mut out = String::new();
    for (file, summary) in summaries {
        out.push_str(&format!("\nFile: {file}\nSummary: {summary}\n"));
    }
    out
}

pub struct Summarizer<'a> {
    model: &'a dyn ChatModel,
    template: String,
    concurrency: usize,
}

impl<'a> Summarizer<'a> {
    pub fn new(model: &'a dyn ChatModel, template: impl Into<String>, concurrency: usize) -> Self {
        Self {
            model,
            template: template.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Summarize every matching file under `root`, at most `concurrency`
    /// model calls in flight. Files that cannot be read or summarized are
    /// logged and left out.
    pub async fn summarize_tree(&self, root: &Path, extension: &str) -> Result<Summaries, SummaryError> {
        let files = prompts::source_files(root, extension)?;
        info!(files = files.len(), concurrency = self.concurrency, "summarizing source files");

        let results: Vec<Option<(String, String)>> = stream::iter(files)
            .map(|path| self.summarize_file(root, path))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        Ok(results.into_iter().flatten().collect())
    }

    async fn summarize_file(&self, root: &Path, path: PathBuf) -> Option<(String, String)> {
        let rel = path.strip_prefix(root).unwrap_or(&path).display().to_string();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(file = %rel, error = %e, "failed to read file for summary");
                return None;
            }
        };
        debug!(file = %rel, "summarizing");
        match self.model.ask(&summary_prompt(&self.template, &rel, &content)).await {
            Ok(summary) => Some((rel, summary)),
            Err(e) => {
                warn!(file = %rel, error = %e, "summary failed");
                None
            }
        }
    }

    /// Summaries for the tree at `commit_hash`, read from
    /// `cache_dir/<hash>.json` when present and written there otherwise.
    pub async fn cached(
        &self,
        root: &Path,
        extension: &str,
        cache_dir: &Path,
        commit_hash: &str,
    ) -> Result<Summaries, SummaryError> {
        let path = cache_dir.join(format!("{commit_hash}.json"));
        if let Some(summaries) = read_cache(&path) {
            info!(path = %path.display(), "using cached summaries");
            return Ok(summaries);
        }

        let summaries = self.summarize_tree(root, extension).await?;
        write_cache(&path, &summaries)?;
        Ok(summaries)
    }
}

fn read_cache(path: &Path) -> Option<Summaries> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(summaries) => Some(summaries),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring corrupt summary cache");
            None
        }
    }
}

fn write_cache(path: &Path, summaries: &Summaries) -> Result<(), SummaryError> {
    let io_err = |source| SummaryError::Cache {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let text = serde_json::to_string_pretty(summaries).unwrap_or_default();
    std::fs::write(path, text).map_err(io_err)
}
