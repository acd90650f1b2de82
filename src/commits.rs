//! Commit catalogue: the commits a run can target.
//!
//! Each file in the data folder lists commits one per line as
//! `<type> <message…> <hash>`. The file stem classifies its commits
//! (the `data_type` that namespaces artifacts).

use std::fs;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no commits found in {}", .0.display())]
    Empty(PathBuf),

    #[error("no commit matching {0}")]
    NotFound(String),

    #[error("input closed before a commit was selected")]
    InputClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Change type from the data file (e.g. `feat`, `fix`).
    pub kind: String,
    pub message: String,
    pub hash: String,
    /// Stem of the data file the commit came from.
    pub data_type: String,
}

impl Commit {
    /// Parse `<type> <message…> <hash>`; `None` for blank or short lines.
    pub fn parse_line(line: &str, data_type: &str) -> Option<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 3 {
            return None;
        }
        Some(Self {
            kind: tokens[0].to_string(),
            message: tokens[1..tokens.len() - 1].join(" "),
            hash: tokens[tokens.len() - 1].to_string(),
            data_type: data_type.to_string(),
        })
    }

    pub fn short_hash(&self) -> &str {
        self.hash.get(..8).unwrap_or(&self.hash)
    }
}

/// Read every data file in `folder`, in file-name order.
pub fn load_commits(folder: &Path) -> Result<Vec<Commit>, CommitError> {
    let read_err = |source| CommitError::Read {
        path: folder.to_path_buf(),
        source,
    };
    let mut files: Vec<PathBuf> = fs::read_dir(folder)
        .map_err(read_err)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let mut commits = Vec::new();
    for path in files {
        let data_type = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let text = fs::read_to_string(&path).map_err(|source| CommitError::Read {
            path: path.clone(),
            source,
        })?;
        for (n, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match Commit::parse_line(line, &data_type) {
                Some(commit) => commits.push(commit),
                None => warn!(file = %path.display(), line = n + 1, "skipping malformed commit line"),
            }
        }
    }

    if commits.is_empty() {
        return Err(CommitError::Empty(folder.to_path_buf()));
    }
    debug!(count = commits.len(), "loaded commits");
    Ok(commits)
}

/// Find a commit by full hash or unique-enough prefix.
pub fn find_commit<'a>(commits: &'a [Commit], hash: &str) -> Result<&'a Commit, CommitError> {
    commits
        .iter()
        .find(|c| c.hash == hash)
        .or_else(|| commits.iter().find(|c| c.hash.starts_with(hash)))
        .ok_or_else(|| CommitError::NotFound(hash.to_string()))
}

/// Numbered listing for interactive selection.
pub fn render_listing(commits: &[Commit]) -> String {
    let rule = "-".repeat(80);
    let mut out = format!("\nAvailable commits:\n{rule}\n");
    for (i, c) in commits.iter().enumerate() {
        out.push_str(&format!(
            "[{}] Hash: {} | Type: {} | File: {}\n    Message: {}\n{rule}\n",
            i + 1,
            c.short_hash(),
            c.kind,
            c.data_type,
            c.message
        ));
    }
    out
}

/// Validate a 1-based menu choice; returns the 0-based index.
pub fn parse_choice(input: &str, count: usize) -> Result<usize, String> {
    let choice: usize = input
        .trim()
        .parse()
        .map_err(|_| "please enter a valid number".to_string())?;
    if (1..=count).contains(&choice) {
        Ok(choice - 1)
    } else {
        Err(format!("please enter a number between 1 and {count}"))
    }
}

/// Print the listing and read choices from stdin until one is valid.
pub async fn select_commit(commits: &[Commit]) -> Result<&Commit, CommitError> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout.write_all(render_listing(commits).as_bytes()).await?;

    loop {
        stdout
            .write_all(b"\nSelect a commit (enter its number): ")
            .await?;
        stdout.flush().await?;
        let line = lines.next_line().await?.ok_or(CommitError::InputClosed)?;
        match parse_choice(&line, commits.len()) {
            Ok(index) => return Ok(&commits[index]),
            Err(message) => stdout.write_all(format!("Error: {message}\n").as_bytes()).await?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn parses_multi_word_message() {
        let c = Commit::parse_line("feat add user export endpoint 1a2b3c4d5e6f", "feature").unwrap();
        assert_eq!(c.kind, "feat");
        assert_eq!(c.message, "add user export endpoint");
        assert_eq!(c.hash, "1a2b3c4d5e6f");
        assert_eq!(c.short_hash(), "1a2b3c4d");
        assert_eq!(c.data_type, "feature");
    }

    #[test]
    fn short_lines_are_rejected() {
        assert!(Commit::parse_line("fix 1a2b3c", "bugfix").is_none());
        assert!(Commit::parse_line("   ", "bugfix").is_none());
    }

    #[test]
    fn loads_folder_in_name_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("refactor.txt"), "refactor tidy service cafe01\n").unwrap();
        fs::write(
            dir.path().join("feature.txt"),
            "feat add export beef01\n\nbroken\nfeat add import beef02\n",
        )
        .unwrap();

        let commits = load_commits(dir.path()).unwrap();

        let hashes: Vec<&str> = commits.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, vec!["beef01", "beef02", "cafe01"]);
        assert_eq!(commits[2].data_type, "refactor");
    }

    #[test]
    fn empty_folder_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(load_commits(dir.path()), Err(CommitError::Empty(_))));
        assert!(matches!(
            load_commits(&dir.path().join("missing")),
            Err(CommitError::Read { .. })
        ));
    }

    #[test]
    fn finds_by_prefix() {
        let commits = vec![
            Commit::parse_line("feat a 1111aaaa", "f").unwrap(),
            Commit::parse_line("fix b 2222bbbb", "f").unwrap(),
        ];
        assert_eq!(find_commit(&commits, "2222").unwrap().message, "b");
        assert_eq!(find_commit(&commits, "1111aaaa").unwrap().message, "a");
        assert!(find_commit(&commits, "3333").is_err());
    }

    #[test]
    fn choice_validation() {
        assert_eq!(parse_choice(" 2 ", 3), Ok(1));
        assert!(parse_choice("0", 3).is_err());
        assert!(parse_choice("4", 3).unwrap_err().contains("between 1 and 3"));
        assert!(parse_choice("two", 3).unwrap_err().contains("valid number"));
    }

    #[test]
    fn listing_numbers_from_one() {
        let commits = vec![Commit::parse_line("feat add export 1a2b3c4d5e6f", "feature").unwrap()];
        let text = render_listing(&commits);
        assert!(text.contains("[1] Hash: 1a2b3c4d | Type: feat | File: feature"));
        assert!(text.contains("Message: add export"));
    }
}
