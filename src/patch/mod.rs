//! Change-set interpreter: applies a model's JSON change set to the tree.
//!
//! File operations (create, delete, rename) act on whole files. UPDATE_CODE
//! edits a source file structurally: each change is located through the
//! declaration table and applied as a line-range insert, replace or delete.
//! Failures are contained at the smallest scope: a bad change is skipped,
//! a bad operation is skipped, the run continues.

pub mod change_set;
pub mod engine;
pub mod source_file;

use std::path::PathBuf;

pub use change_set::{Change, ChangeSet, Operation};
pub use engine::{ChangeReport, OperationOutcome, OperationReport, PatchEngine, PatchReport};
pub use source_file::SourceFile;

use crate::treesitter::SyntaxError;

/// Errors at change-set or operation scope.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("invalid change set: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot parse {}: {source}", path.display())]
    Syntax {
        path: PathBuf,
        source: SyntaxError,
    },

    #[error("no structural editing support for {}", path.display())]
    UnsupportedFile { path: PathBuf },

    #[error("CREATE_FILE {} has no content", path.display())]
    MissingContent { path: PathBuf },

    #[error("RENAME_FILE {} has no new path", path.display())]
    MissingTarget { path: PathBuf },

    #[error("unsupported action")]
    UnsupportedAction,
}

/// Why a single change could not be applied.
#[derive(Debug, thiserror::Error)]
pub enum ChangeError {
    #[error("class {0} already exists")]
    ClassExists(String),

    #[error("class {0} not found")]
    ClassNotFound(String),

    #[error("class name {class} is ambiguous: {candidates}")]
    AmbiguousClass { class: String, candidates: String },

    #[error("field {class}.{field} already exists")]
    FieldExists { class: String, field: String },

    #[error("field {class}.{field} not found")]
    FieldNotFound { class: String, field: String },

    #[error("method {class}.{method}({params}) not found")]
    MethodNotFound {
        class: String,
        method: String,
        params: String,
    },

    #[error("import {0} already exists")]
    ImportExists(String),

    #[error("import {0} not found")]
    ImportNotFound(String),

    #[error("{target} shares lines with {other}")]
    SharedLines { target: String, other: String },

    #[error("change has no new_code")]
    MissingNewCode,

    #[error("change has no {0}")]
    MissingName(&'static str),

    #[error("change would leave the file unparseable: {0}")]
    BreaksSyntax(#[source] SyntaxError),

    #[error("unsupported change type")]
    Unsupported,
}
