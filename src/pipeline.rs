//! Pipeline orchestrator: one commit, end to end.
//!
//! checkout parent → locate session → code-change request → patch engine.
//! Steps run strictly in order against a working tree the run owns.
//! Everything a user would read is written through the `RunLog`, so the
//! run's log artifact holds the same text as the console.

use serde_json::Value;
use tracing::{info, warn};

use crate::agent::code_change::{self, CodeChangeError, Proposal};
use crate::agent::locate;
use crate::agent::prompts::PromptError;
use crate::artifacts::{ArtifactError, RunArtifacts, RunLog};
use crate::commits::Commit;
use crate::config::Config;
use crate::conversation::{AnswerSource, ConversationError, Session, Termination};
use crate::git::{self, GitError};
use crate::llm::types::Role;
use crate::llm::ChatModel;
use crate::patch::{PatchEngine, PatchReport};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("checkout failed: {0}")]
    Checkout(#[from] GitError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("locate session failed: {0}")]
    Locate(#[from] ConversationError),

    #[error("locate session ended after {turns} turns without an answer")]
    NoLocateResult { turns: usize },

    #[error(transparent)]
    CodeChange(#[from] CodeChangeError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Everything a run produced.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Hash the tree was checked out to.
    pub parent: String,
    pub session: Session,
    pub proposal: Proposal,
    /// `None` when the change set did not parse.
    pub report: Option<PatchReport>,
}

pub struct Pipeline<'a> {
    config: &'a Config,
    model: &'a dyn ChatModel,
    artifacts: RunArtifacts,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, model: &'a dyn ChatModel, artifacts: RunArtifacts) -> Self {
        Self {
            config,
            model,
            artifacts,
        }
    }

    pub fn artifacts(&self) -> &RunArtifacts {
        &self.artifacts
    }

    /// Run every step for `commit`. Checkout and locate failures abort the
    /// run; an unparseable change set ends it without touching the tree.
    pub async fn run(
        &self,
        commit: &Commit,
        answers: &mut dyn AnswerSource,
        log: &mut RunLog,
    ) -> Result<PipelineOutcome, PipelineError> {
        log.line(format!("Selected commit {} - {}", commit.hash, commit.message));

        let parent = match git::checkout_parent(&self.config.project_root, &commit.hash) {
            Ok(parent) => parent,
            Err(e) => {
                log.line(format!("git checkout failed: {e}"));
                return Err(e.into());
            }
        };
        log.line(format!("git checkout success: {parent}"));

        log.rule();
        log.line("Locating the code to change...");
        let session = locate::locate(self.model, self.config, commit, answers).await?;
        let locate_result = match self.record_locate(commit, &session, log)? {
            Some(text) => text,
            None => {
                return Err(match session.termination {
                    Termination::Failed(e) => e.into(),
                    _ => PipelineError::NoLocateResult {
                        turns: session.turns.len(),
                    },
                })
            }
        };

        log.rule();
        log.line("Requesting code changes...");
        let proposal = code_change::propose_changes(self.model, self.config, commit, &locate_result).await?;
        log.line(format!("Model code change answer:\n{}", proposal.reply));

        let report = match &proposal.change_set {
            Ok(set) => {
                log.line("Applying code changes...");
                let report = PatchEngine::new(&self.config.project_root).apply(set);
                log.line(report.to_string());
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, "change set rejected");
                log.line(format!("Could not apply code changes: {e}"));
                None
            }
        };

        log.line("Pipeline execution completed");
        info!(commit = %commit.short_hash(), "pipeline finished");
        Ok(PipelineOutcome {
            parent,
            session,
            proposal,
            report,
        })
    }

    /// Persist the locate transcript and result; return the text handed to
    /// the code-change request, `None` when there is nothing to hand over.
    fn record_locate(
        &self,
        commit: &Commit,
        session: &Session,
        log: &mut RunLog,
    ) -> Result<Option<String>, PipelineError> {
        let transcript = self.artifacts.write_transcript(
            locate::STAGE,
            &commit.data_type,
            &commit.hash,
            &session.conversation,
            session.result(),
        )?;
        log.line(format!("Transcript saved to {}", transcript.display()));

        match &session.termination {
            Termination::Finalized(result) => {
                let path = self
                    .artifacts
                    .write_result(locate::STAGE, &commit.data_type, &commit.hash, result)?;
                let text = pretty(result);
                log.line(format!("Functions to change:\n{text}"));
                log.line(format!("Result saved to {}", path.display()));
                Ok(Some(text))
            }
            Termination::Exhausted { turns } => {
                // Best effort: hand over the model's last word.
                let last = session.conversation.last_from(Role::Assistant);
                if last.is_some() {
                    log.line(format!(
                        "No final answer after {turns} turns; using the last model reply"
                    ));
                }
                Ok(last.map(|m| m.content.clone()))
            }
            Termination::Failed(e) => {
                log.line(format!("Locate session failed: {e}"));
                Ok(None)
            }
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::path::Path;
    use std::process::Command;

    use tempfile::TempDir;

    use crate::conversation::FixedAnswer;
    use crate::llm::testing::ScriptedModel;

    const BEFORE: &str = "package shop;\n\npublic class Cart {\n    public int total() {\n        return 0;\n    }\n}\n";

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
            .args(["-c", "commit.gpgsign=false"])
            .args(args)
            .output()
            .unwrap()
            .status;
        assert!(status.success(), "git {args:?} failed");
    }

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    /// Repo with two commits; returns the second commit's hash.
    fn repo(dir: &Path) -> String {
        git(dir, &["init", "--quiet"]);
        fs::write(dir.join("Cart.java"), BEFORE).unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "--quiet", "-m", "cart"]);
        fs::write(dir.join("Cart.java"), BEFORE.replace("return 0;", "return 1;")).unwrap();
        git(dir, &["commit", "--quiet", "-am", "fix total"]);
        let out = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["rev-parse", "HEAD"])
            .output()
            .unwrap();
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    }

    fn setup() -> (TempDir, Config, Commit) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("shop");
        fs::create_dir_all(&root).unwrap();
        let hash = repo(&root);
        let config = Config {
            project_root: root,
            results_dir: dir.path().join("result"),
            logs_dir: dir.path().join("logs"),
            ..Config::default()
        };
        let commit = Commit {
            kind: "fix".into(),
            message: "fix total".into(),
            hash,
            data_type: "bugfix".into(),
        };
        (dir, config, commit)
    }

    #[tokio::test]
    async fn runs_every_step() {
        if !git_available() {
            return;
        }
        let (_dir, config, commit) = setup();
        let model = ScriptedModel::new([
            "[{\"file\": \"Cart.java\", \"function\": \"total\", \"operation\": \"update\"}]",
            r#"```json
{"operations": [{"action": "UPDATE_CODE", "file": "Cart.java", "changes": [
  {"type": "UPDATE_METHOD", "class": "Cart", "method": "total", "params": [],
   "new_code": "    public int total() {\n        return 1;\n    }"}
]}]}
```"#,
        ]);
        let artifacts = RunArtifacts::with_timestamp(&config.results_dir, &config.logs_dir, "20250101000000");
        let log_path = artifacts.run_log_path(&commit.data_type, &commit.hash);
        let mut log = RunLog::with_console(&log_path, std::io::sink()).unwrap();
        let pipeline = Pipeline::new(&config, &model, artifacts);

        let outcome = pipeline
            .run(&commit, &mut FixedAnswer::new("n/a"), &mut log)
            .await
            .unwrap();

        let report = outcome.report.unwrap();
        assert_eq!(report.applied(), 1);
        assert_eq!(report.failures(), 0);
        assert_eq!(
            fs::read_to_string(config.project_root.join("Cart.java")).unwrap(),
            BEFORE.replace("return 0;", "return 1;")
        );

        let code_change_prompt = &model.calls()[1][0].content;
        assert!(code_change_prompt.contains("\"function\": \"total\""));
        assert!(code_change_prompt.contains("return 0;"));

        let result = pipeline
            .artifacts()
            .result_path(locate::STAGE, "bugfix", &commit.hash);
        assert!(result.is_file());
        let log_text = fs::read_to_string(&log_path).unwrap();
        assert!(log_text.contains("git checkout success"));
        assert!(log_text.ends_with("Pipeline execution completed\n"));
    }

    #[tokio::test]
    async fn malformed_change_set_leaves_tree_alone() {
        if !git_available() {
            return;
        }
        let (_dir, config, commit) = setup();
        let model = ScriptedModel::new([
            "[{\"file\": \"Cart.java\", \"function\": \"total\", \"operation\": \"update\"}]",
            "Sorry, no idea.",
        ]);
        let artifacts = RunArtifacts::with_timestamp(&config.results_dir, &config.logs_dir, "1");
        let mut log = RunLog::with_console(&artifacts.run_log_path("bugfix", "x"), std::io::sink()).unwrap();
        let pipeline = Pipeline::new(&config, &model, artifacts);

        let outcome = pipeline
            .run(&commit, &mut FixedAnswer::new("n/a"), &mut log)
            .await
            .unwrap();

        assert!(outcome.report.is_none());
        assert_eq!(fs::read_to_string(config.project_root.join("Cart.java")).unwrap(), BEFORE);
    }

    #[tokio::test]
    async fn checkout_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            project_root: dir.path().join("missing"),
            ..Config::default()
        };
        let model = ScriptedModel::new(Vec::<String>::new());
        let artifacts = RunArtifacts::with_timestamp(dir.path().join("r"), dir.path().join("l"), "1");
        let mut log = RunLog::with_console(&dir.path().join("run.txt"), std::io::sink()).unwrap();
        let commit = Commit::parse_line("fix x abc123", "bugfix").unwrap();

        let err = Pipeline::new(&config, &model, artifacts)
            .run(&commit, &mut FixedAnswer::new("n/a"), &mut log)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Checkout(GitError::NotADirectory(_))));
        assert!(model.calls().is_empty());
    }
}
