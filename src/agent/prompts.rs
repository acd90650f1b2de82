//! Prompt templates and prompt assembly.
//!
//! Each stage has a built-in template that a file in the configured prompt
//! directory (`<prompt_dir>/<name>.txt`) can override. Templates carry
//! `{name}` placeholders filled in by [`render`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, warn};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(\w+)\}").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("failed to read prompt {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid source pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// The prompts a run can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    LocateWithQuestions,
    CodeChange,
    RagLocate,
    Summary,
}

impl Template {
    /// File stem used for overrides.
    pub fn name(self) -> &'static str {
        match self {
            Self::LocateWithQuestions => "locate_with_questions",
            Self::CodeChange => "code_change",
            Self::RagLocate => "rag_locate",
            Self::Summary => "summary",
        }
    }

    pub fn builtin(self) -> &'static str {
        match self {
            Self::LocateWithQuestions => LOCATE_WITH_QUESTIONS,
            Self::CodeChange => CODE_CHANGE,
            Self::RagLocate => RAG_LOCATE,
            Self::Summary => SUMMARY,
        }
    }
}

pub const LOCATE_WITH_QUESTIONS: &str = "\
You are helping to implement a commit in a Java repository.

Commit {commit_hash} ({commit_type}): {commit_msg}

Work out which functions have to change to implement this commit. If you \
need more information, ask one question at a time and wait for the answer, \
or call a tool to read a file. When you are certain, reply with only a JSON \
array, one object per function:

[{\"file\": \"<relative path>\", \"class\": \"<class name>\", \"function\": \"<method name>\", \"operation\": \"add|update|delete\"}]

The repository:

{code_repo}";

pub const CODE_CHANGE: &str = "\
You are implementing commit {commit_hash} ({commit_type}) in the repository {repo_name}.

Commit message: {commit_msg}

These functions were identified as the ones to change:

{locate_result}

The repository:

{code_repo}

Reply with only a JSON change set. Use exactly this format:

{change_set_example}";

pub const RAG_LOCATE: &str = "\
Your mission, of type {commit_type}, is to {commit_msg}.

These file summaries were retrieved as the most relevant parts of the code base:

{context}

List the functions that have to change as a JSON array, one object per \
function, with the keys \"file\", \"class\", \"function\" and \"operation\".";

pub const SUMMARY: &str = "\
Summarize the file {file_path}.

Overall summary: describe the main purpose and responsibilities of the file.

{function_section}
File content:
{file_content}";

/// Sample change set shown to the model in the code-change prompt.
pub const CHANGE_SET_EXAMPLE: &str = r#"{
  "operations": [
    {
      "action": "UPDATE_CODE",
      "file": "src/main/java/com/example/UserService.java",
      "changes": [
        {
          "type": "ADD_IMPORT",
          "import": "java.util.Optional"
        },
        {
          "type": "ADD_FIELD",
          "class": "UserService",
          "new_code": "private final AuditLog auditLog;"
        },
        {
          "type": "UPDATE_METHOD",
          "class": "UserService",
          "method": "findUser",
          "params": ["String"],
          "new_code": "public Optional<User> findUser(String id) {\n    return Optional.ofNullable(users.get(id));\n}"
        },
        {
          "type": "ADD_METHOD",
          "class": "UserService",
          "new_code": "public void deleteUser(String id) {\n    users.remove(id);\n    auditLog.record(id);\n}"
        }
      ]
    },
    {
      "action": "CREATE_FILE",
      "file": "src/main/java/com/example/AuditLog.java",
      "content": "package com.example;\n\npublic class AuditLog {\n    public void record(String id) {\n    }\n}\n"
    }
  ]
}"#;

/// Template text: the override file if one exists, else the built-in.
pub fn load_template(template: Template, prompt_dir: Option<&Path>) -> Result<String, PromptError> {
    if let Some(dir) = prompt_dir {
        let path = dir.join(format!("{}.txt", template.name()));
        if path.is_file() {
            debug!(path = %path.display(), "using prompt override");
            return std::fs::read_to_string(&path).map_err(|source| PromptError::Read { path, source });
        }
    }
    Ok(template.builtin().to_string())
}

/// Replace `{name}` placeholders in one pass. Unknown placeholders are left
/// as written, and substituted values are never rescanned.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let vars: HashMap<&str, &str> = vars.iter().copied().collect();
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Every `*.<extension>` file under `root`, as `File: <relative path>`
/// followed by its content. Unreadable files are logged and skipped.
pub fn code_repo_listing(root: &Path, extension: &str) -> Result<String, PromptError> {
    let mut out = String::new();
    for path in source_files(root, extension)? {
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let rel = path.strip_prefix(root).unwrap_or(&path);
                out.push_str(&format!("File: {}\nContent:\n{}\n\n", rel.display(), content));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
        }
    }
    Ok(out)
}

/// Files under `root` with the given extension, in path order.
pub fn source_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>, PromptError> {
    let pattern = format!(
        "{}/**/*.{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        extension
    );
    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "skipping unreadable path"),
        }
    }
    files.sort();
    Ok(files)
}
