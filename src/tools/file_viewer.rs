//! `view` tool: return a file, or an inclusive line range of it.
//!
//! Every call reads from disk. Relative paths resolve against the project
//! root; absolute paths are used as given.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::Tool;
use crate::conversation::tool_call::ToolDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("file {} does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("no permission to read {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("cannot read {} as text, it may be a binary file", path.display())]
    NotText { path: PathBuf },

    #[error("start line {start} is beyond the end of the file ({line_count} lines)")]
    StartBeyondEnd { start: usize, line_count: usize },

    #[error("error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// File content provider rooted at the project working tree.
#[derive(Debug, Clone)]
pub struct FileViewer {
    root: PathBuf,
}

impl FileViewer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Serve a parsed tool call.
    pub fn read(&self, descriptor: &ToolDescriptor) -> Result<String, ViewError> {
        self.read_path(
            &descriptor.filepath,
            &descriptor.filename,
            descriptor.start_line,
            descriptor.end_line,
        )
    }

    pub fn read_path(
        &self,
        filepath: &str,
        filename: &str,
        start_line: Option<usize>,
        end_line: Option<usize>,
    ) -> Result<String, ViewError> {
        let path = self.resolve(filepath, filename);
        read_file_content(&path, start_line, end_line)
    }

    fn resolve(&self, filepath: &str, filename: &str) -> PathBuf {
        let dir = Path::new(filepath);
        if dir.is_absolute() {
            dir.join(filename)
        } else {
            self.root.join(dir).join(filename)
        }
    }
}

impl Tool for FileViewer {
    fn name(&self) -> &str {
        "view"
    }

    fn description(&self) -> &str {
        "View the content of a file in the repository, optionally limited to a line range."
    }

    fn request_format(&self) -> &str {
        r#"<tool>
  <action type="view">
    <filepath>directory of the file, relative to the project root</filepath>
    <filename>file name</filename>
    <start_line>first line to show (optional)</start_line>
    <end_line>last line to show (optional)</end_line>
  </action>
</tool>"#
    }

    fn notes(&self) -> &str {
        "Line numbers are 1-based and inclusive. Omit both line bounds to see the whole file."
    }
}

/// Read a file, or the inclusive 1-based line range `start..=end` of it.
///
/// `start` is raised to 1 and `end` is clamped to the line count; a missing
/// `end` means "to the end of the file". Line terminators are preserved.
pub fn read_file_content(
    path: &Path,
    start_line: Option<usize>,
    end_line: Option<usize>,
) -> Result<String, ViewError> {
    let bytes = fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ViewError::NotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => ViewError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ViewError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let content = String::from_utf8(bytes).map_err(|_| ViewError::NotText {
        path: path.to_path_buf(),
    })?;

    if start_line.is_none() && end_line.is_none() {
        return Ok(content);
    }

    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let line_count = lines.len();
    let start = start_line.unwrap_or(1).max(1);
    if start > line_count {
        return Err(ViewError::StartBeyondEnd { start, line_count });
    }
    let end = end_line.unwrap_or(line_count).max(start).min(line_count);

    Ok(lines[start - 1..end].concat())
}
