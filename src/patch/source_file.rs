//! A source file being edited: its lines plus a declaration table that is
//! rebuilt after every edit.
//!
//! Lines are held without terminators; the file's own terminator (`\n` or
//! `\r\n`) is restored on every line when the text is rebuilt.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::PatchError;
use crate::treesitter::languages::Lang;
use crate::treesitter::{DeclarationTable, SyntaxError};

/// A line-range edit. Line numbers are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Insert lines so that the first of them becomes line `before`.
    Insert { before: usize, lines: Vec<String> },
    Replace {
        start: usize,
        end: usize,
        lines: Vec<String>,
    },
    Remove { start: usize, end: usize },
}

#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    lang: Lang,
    newline: &'static str,
    lines: Vec<String>,
    table: DeclarationTable,
}

impl SourceFile {
    /// Read and parse a file. Missing files, unsupported languages and
    /// unparseable sources are errors.
    pub fn load(path: &Path) -> Result<Self, PatchError> {
        let lang = Lang::from_path(path).ok_or_else(|| PatchError::UnsupportedFile {
            path: path.to_path_buf(),
        })?;
        let text = fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PatchError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                PatchError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_source(path, lang, &text).map_err(|source| PatchError::Syntax {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_source(path: &Path, lang: Lang, text: &str) -> Result<Self, SyntaxError> {
        let table = DeclarationTable::parse(lang, text)?;
        let crlf = text.contains("\r\n");
        let lines = text
            .split('\n')
            .map(|line| if crlf { line.strip_suffix('\r').unwrap_or(line) } else { line })
            .map(str::to_string)
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            lang,
            newline: if crlf { "\r\n" } else { "\n" },
            lines,
            table,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn table(&self) -> &DeclarationTable {
        &self.table
    }

    pub fn text(&self) -> String {
        self.lines.join(self.newline)
    }

    /// Apply an edit and re-derive declaration positions. An edit that
    /// leaves the file unparseable is rolled back.
    pub fn apply(&mut self, edit: Edit) -> Result<(), SyntaxError> {
        let before = self.lines.clone();
        match edit {
            Edit::Insert { before: line, lines } => {
                let at = line.saturating_sub(1).min(self.lines.len());
                self.lines.splice(at..at, lines);
            }
            Edit::Replace { start, end, lines } => {
                let range = self.range(start, end);
                self.lines.splice(range, lines);
            }
            Edit::Remove { start, end } => {
                let range = self.range(start, end);
                self.lines.drain(range);
            }
        }

        match DeclarationTable::parse(self.lang, &self.text()) {
            Ok(table) => {
                self.table = table;
                Ok(())
            }
            Err(e) => {
                self.lines = before;
                Err(e)
            }
        }
    }

    /// Rewrite the file in one step: write a sibling temp file, then rename.
    pub fn save(&self) -> Result<(), PatchError> {
        let write_err = |source: std::io::Error| PatchError::Write {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(self.text().as_bytes()).map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    fn range(&self, start: usize, end: usize) -> std::ops::Range<usize> {
        let from = start.saturating_sub(1).min(self.lines.len());
        let to = end.min(self.lines.len()).max(from);
        from..to
    }
}
