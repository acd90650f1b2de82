//! Version-control checkout: put the working tree at a commit's parent.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("cannot find the parent of commit {hash}: {stderr}")]
    ParentNotFound { hash: String, stderr: String },

    #[error("checkout of {hash} failed: {stderr}")]
    CheckoutFailed { hash: String, stderr: String },

    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Check out the parent of `hash` in `project_root`. Returns the parent's
/// full hash.
pub fn checkout_parent(project_root: &Path, hash: &str) -> Result<String, GitError> {
    if !project_root.is_dir() {
        return Err(GitError::NotADirectory(project_root.to_path_buf()));
    }
    if !project_root.join(".git").exists() {
        return Err(GitError::NotARepository(project_root.to_path_buf()));
    }

    let parent = run_git(project_root, &["rev-parse", &format!("{hash}~1")])?.map_err(
        |stderr| GitError::ParentNotFound {
            hash: hash.to_string(),
            stderr,
        },
    )?;
    let parent = parent.trim().to_string();

    run_git(project_root, &["checkout", "--quiet", &parent])?.map_err(|stderr| {
        GitError::CheckoutFailed {
            hash: parent.clone(),
            stderr,
        }
    })?;

    info!(commit = hash, parent = %parent, "checked out parent commit");
    Ok(parent)
}

/// Run `git -C <dir> <args>`: stdout on success, stderr on a non-zero exit.
/// The outer error is failing to spawn git at all.
fn run_git(dir: &Path, args: &[&str]) -> std::io::Result<Result<String, String>> {
    let output = Command::new("git").arg("-C").arg(dir).args(args).output()?;

    if !output.status.success() {
        return Ok(Err(String::from_utf8_lossy(&output.stderr).trim().to_string()));
    }

    Ok(Ok(String::from_utf8_lossy(&output.stdout).to_string()))
}
