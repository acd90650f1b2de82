//! Change-set document model.
//!
//! ```json
//! {"operations": [
//!   {"file": "src/Foo.java", "action": "UPDATE_CODE", "changes": [
//!     {"type": "UPDATE_METHOD", "class": "Foo", "method": "bar",
//!      "params": ["String"], "new_code": "..."}
//!   ]}
//! ]}
//! ```
//!
//! Names are optional at the serde level so that one incomplete change is
//! reported on its own instead of rejecting the whole document.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use super::PatchError;
use crate::conversation::format::strip_code_fence;

/// An ordered list of file operations, applied once in document order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangeSet {
    pub operations: Vec<Operation>,
}

impl ChangeSet {
    /// Parse a model answer; an optional ```` ```json ```` fence is stripped.
    pub fn from_json(text: &str) -> Result<Self, PatchError> {
        Ok(serde_json::from_str(strip_code_fence(text, "json"))?)
    }

    pub fn load(path: &Path) -> Result<Self, PatchError> {
        let text = std::fs::read_to_string(path).map_err(|source| PatchError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    CreateFile {
        file: String,
        content: Option<String>,
    },
    DeleteFile {
        file: String,
    },
    RenameFile {
        file: String,
        #[serde(alias = "new_path", alias = "to")]
        new_file: Option<String>,
    },
    UpdateCode {
        file: String,
        #[serde(default)]
        changes: Vec<Change>,
    },
    #[serde(other)]
    Unknown,
}

impl Operation {
    pub fn action(&self) -> &'static str {
        match self {
            Self::CreateFile { .. } => "CREATE_FILE",
            Self::DeleteFile { .. } => "DELETE_FILE",
            Self::RenameFile { .. } => "RENAME_FILE",
            Self::UpdateCode { .. } => "UPDATE_CODE",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn file(&self) -> Option<&str> {
        match self {
            Self::CreateFile { file, .. }
            | Self::DeleteFile { file }
            | Self::RenameFile { file, .. }
            | Self::UpdateCode { file, .. } => Some(file.as_str()),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Change {
    AddClass {
        class: Option<String>,
        new_code: Option<String>,
    },
    RemoveClass {
        class: Option<String>,
    },
    AddField {
        class: Option<String>,
        field: Option<String>,
        new_code: Option<String>,
    },
    RemoveField {
        class: Option<String>,
        field: Option<String>,
    },
    UpdateField {
        class: Option<String>,
        field: Option<String>,
        new_code: Option<String>,
    },
    AddMethod {
        class: Option<String>,
        method: Option<String>,
        #[serde(default)]
        params: Vec<String>,
        new_code: Option<String>,
    },
    RemoveMethod {
        class: Option<String>,
        method: Option<String>,
        #[serde(default)]
        params: Vec<String>,
    },
    UpdateMethod {
        class: Option<String>,
        method: Option<String>,
        #[serde(default)]
        params: Vec<String>,
        new_code: Option<String>,
    },
    AddImport {
        #[serde(alias = "path")]
        import: Option<String>,
        new_code: Option<String>,
    },
    RemoveImport {
        #[serde(alias = "path")]
        import: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl Change {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddClass { .. } => "ADD_CLASS",
            Self::RemoveClass { .. } => "REMOVE_CLASS",
            Self::AddField { .. } => "ADD_FIELD",
            Self::RemoveField { .. } => "REMOVE_FIELD",
            Self::UpdateField { .. } => "UPDATE_FIELD",
            Self::AddMethod { .. } => "ADD_METHOD",
            Self::RemoveMethod { .. } => "REMOVE_METHOD",
            Self::UpdateMethod { .. } => "UPDATE_METHOD",
            Self::AddImport { .. } => "ADD_IMPORT",
            Self::RemoveImport { .. } => "REMOVE_IMPORT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |n: &Option<String>| n.clone().unwrap_or_else(|| "?".into());
        match self {
            Self::AddClass { class, .. } | Self::RemoveClass { class } => {
                write!(f, "{} {}", self.kind(), name(class))
            }
            Self::AddField { class, field, .. }
            | Self::RemoveField { class, field }
            | Self::UpdateField { class, field, .. } => {
                write!(f, "{} {}.{}", self.kind(), name(class), name(field))
            }
            Self::AddMethod { class, method, params, .. }
            | Self::RemoveMethod { class, method, params }
            | Self::UpdateMethod { class, method, params, .. } => write!(
                f,
                "{} {}.{}({})",
                self.kind(),
                name(class),
                name(method),
                params.join(", ")
            ),
            Self::AddImport { import, .. } | Self::RemoveImport { import } => {
                write!(f, "{} {}", self.kind(), name(import))
            }
            Self::Unknown => f.write_str("UNKNOWN"),
        }
    }
}
