//! Model-facing stages of a run.
//!
//! - `prompts`: templates, overrides and code-repo listing
//! - `locate`: the interactive locate session (with file-view tool)
//! - `rag`: single-shot locate over retrieved summaries
//! - `code_change`: ask for a change set given a locate result
//! - `summarize`: per-file summaries, cached per commit

pub mod code_change;
pub mod locate;
pub mod prompts;
pub mod rag;
pub mod summarize;

use crate::commits::Commit;

/// Placeholder values every commit-scoped template can use.
pub fn commit_vars(commit: &Commit) -> [(&'static str, &str); 3] {
    [
        ("commit_hash", commit.hash.as_str()),
        ("commit_msg", commit.message.as_str()),
        ("commit_type", commit.kind.as_str()),
    ]
}

#[cfg(test)]
pub(crate) fn sample_commit() -> Commit {
    Commit {
        kind: "feat".into(),
        message: "add user deletion".into(),
        hash: "1a2b3c4d5e6f".into(),
        data_type: "feature".into(),
    }
}
