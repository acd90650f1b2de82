//! Run artifacts: result files, conversation transcripts and the console
//! log of a pipeline run.
//!
//! Layout, with one timestamp per run:
//!
//! ```text
//! <results_dir>/<stage>/<data_type>/<hash>/<timestamp>.txt   result JSON
//! <logs_dir>/<stage>/<data_type>/<hash>/<timestamp>.txt      transcript
//! <logs_dir>/<data_type>/<hash>/<timestamp>.txt              pipeline console log
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::conversation::Conversation;
use crate::llm::types::Role;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Artifact paths for one run.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    results_dir: PathBuf,
    logs_dir: PathBuf,
    timestamp: String,
}

impl RunArtifacts {
    /// Stamp the run with the current local time.
    pub fn new(results_dir: impl Into<PathBuf>, logs_dir: impl Into<PathBuf>) -> Self {
        let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
        Self::with_timestamp(results_dir, logs_dir, timestamp)
    }

    pub fn with_timestamp(
        results_dir: impl Into<PathBuf>,
        logs_dir: impl Into<PathBuf>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            results_dir: results_dir.into(),
            logs_dir: logs_dir.into(),
            timestamp: timestamp.into(),
        }
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn result_path(&self, stage: &str, data_type: &str, hash: &str) -> PathBuf {
        self.results_dir
            .join(stage)
            .join(data_type)
            .join(hash)
            .join(self.file_name())
    }

    pub fn transcript_path(&self, stage: &str, data_type: &str, hash: &str) -> PathBuf {
        self.logs_dir
            .join(stage)
            .join(data_type)
            .join(hash)
            .join(self.file_name())
    }

    pub fn run_log_path(&self, data_type: &str, hash: &str) -> PathBuf {
        self.logs_dir
            .join(data_type)
            .join(hash)
            .join(self.file_name())
    }

    /// Write a result as pretty-printed JSON.
    pub fn write_result(
        &self,
        stage: &str,
        data_type: &str,
        hash: &str,
        result: &Value,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.result_path(stage, data_type, hash);
        write_file(&path, &pretty(result))?;
        Ok(path)
    }

    pub fn write_transcript(
        &self,
        stage: &str,
        data_type: &str,
        hash: &str,
        conversation: &Conversation,
        result: Option<&Value>,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.transcript_path(stage, data_type, hash);
        write_file(&path, &render_transcript(conversation, result))?;
        Ok(path)
    }

    fn file_name(&self) -> String {
        format!("{}.txt", self.timestamp)
    }
}

/// Human-readable transcript: every message, then the final result.
pub fn render_transcript(conversation: &Conversation, result: Option<&Value>) -> String {
    let total = conversation.len();
    let mut out = String::from("=== Conversation ===\n\n");
    for (i, message) in conversation.messages().iter().enumerate() {
        out.push_str(&format!(
            "--- {} [{}/{}] ---\n{}\n\n",
            role_title(message.role),
            i + 1,
            total,
            message.content
        ));
    }
    out.push_str("=== Final Result ===\n\n");
    match result {
        Some(value) => out.push_str(&pretty(value)),
        None => out.push_str("(no final result)"),
    }
    out
}

fn role_title(role: Role) -> &'static str {
    match role {
        Role::System => "System",
        Role::User => "User",
        Role::Assistant => "Assistant",
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn write_file(path: &Path, contents: &str) -> Result<(), ArtifactError> {
    let io_err = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, contents).map_err(io_err)
}

/// Console output of a run, mirrored line by line into a log file.
pub struct RunLog {
    path: PathBuf,
    file: File,
    console: Box<dyn Write + Send>,
    file_failed: bool,
}

impl RunLog {
    /// Tee to stdout and `path`.
    pub fn create(path: &Path) -> Result<Self, ArtifactError> {
        Self::with_console(path, std::io::stdout())
    }

    pub fn with_console(
        path: &Path,
        console: impl Write + Send + 'static,
    ) -> Result<Self, ArtifactError> {
        let io_err = |source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = File::create(path).map_err(io_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            console: Box::new(console),
            file_failed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Print one line to the console and append it to the log file.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        let _ = writeln!(self.console, "{text}");
        if let Err(e) = writeln!(self.file, "{text}") {
            if !self.file_failed {
                warn!(path = %self.path.display(), error = %e, "run log write failed");
                self.file_failed = true;
            }
        }
    }

    /// A horizontal rule.
    pub fn rule(&mut self) {
        self.line("-".repeat(80));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn paths_are_namespaced() {
        let artifacts = RunArtifacts::with_timestamp("result", "logs", "20250102030405");
        assert_eq!(
            artifacts.result_path("locate_with_questions", "feature", "abc123"),
            PathBuf::from("result/locate_with_questions/feature/abc123/20250102030405.txt")
        );
        assert_eq!(
            artifacts.transcript_path("locate_with_questions", "feature", "abc123"),
            PathBuf::from("logs/locate_with_questions/feature/abc123/20250102030405.txt")
        );
        assert_eq!(
            artifacts.run_log_path("feature", "abc123"),
            PathBuf::from("logs/feature/abc123/20250102030405.txt")
        );
    }

    #[test]
    fn timestamp_has_fourteen_digits() {
        let artifacts = RunArtifacts::new("r", "l");
        assert_eq!(artifacts.timestamp().len(), 14);
        assert!(artifacts.timestamp().chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn transcript_lists_messages_then_result() {
        let mut convo = Conversation::seeded("find it");
        convo.push_assistant("[{\"file\": \"A.java\"}]");
        let text = render_transcript(&convo, Some(&json!([{"file": "A.java"}])));

        assert!(text.starts_with("=== Conversation ===\n\n--- User [1/2] ---\nfind it\n\n"));
        assert!(text.contains("--- Assistant [2/2] ---\n"));
        assert!(text.contains("=== Final Result ===\n\n[\n  {\n    \"file\": \"A.java\"\n  }\n]"));
    }

    #[test]
    fn transcript_without_result() {
        let text = render_transcript(&Conversation::seeded("p"), None);
        assert!(text.ends_with("(no final result)"));
    }

    #[test]
    fn writes_result_and_transcript() {
        let dir = TempDir::new().unwrap();
        let artifacts = RunArtifacts::with_timestamp(
            dir.path().join("result"),
            dir.path().join("logs"),
            "20250101000000",
        );
        let result = json!([{"file": "A.java", "function": "f", "operation": "update"}]);

        let result_path = artifacts
            .write_result("locate_with_questions", "bugfix", "abc", &result)
            .unwrap();
        let transcript_path = artifacts
            .write_transcript(
                "locate_with_questions",
                "bugfix",
                "abc",
                &Conversation::seeded("p"),
                Some(&result),
            )
            .unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(result_path).unwrap()).unwrap();
        assert_eq!(written, result);
        assert!(fs::read_to_string(transcript_path).unwrap().contains("--- User [1/1] ---"));
    }

    #[test]
    fn run_log_mirrors_lines_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/feature/abc/1.txt");
        {
            let mut log = RunLog::with_console(&path, std::io::sink()).unwrap();
            log.line("checking out parent");
            log.rule();
            log.line(String::from("done"));
        }
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, format!("checking out parent\n{}\ndone\n", "-".repeat(80)));
    }
}
