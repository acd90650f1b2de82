//! Code-change request: turn a locate result into a change set.

use tracing::info;

use super::commit_vars;
use super::prompts::{self, PromptError, Template, CHANGE_SET_EXAMPLE};
use crate::commits::Commit;
use crate::config::Config;
use crate::llm::client::LlmError;
use crate::llm::ChatModel;
use crate::patch::{ChangeSet, PatchError};

/// Artifact stage name.
pub const STAGE: &str = "code_change";

#[derive(Debug, thiserror::Error)]
pub enum CodeChangeError {
    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("model call failed: {0}")]
    Model(#[from] LlmError),
}

/// A code-change reply and its parsed change set.
#[derive(Debug)]
pub struct Proposal {
    pub reply: String,
    pub change_set: Result<ChangeSet, PatchError>,
}

pub fn code_change_prompt(config: &Config, commit: &Commit, locate_result: &str) -> Result<String, PromptError> {
    let template = prompts::load_template(Template::CodeChange, config.prompt_dir.as_deref())?;
    let code_repo = prompts::code_repo_listing(&config.project_root, &config.source_extension)?;
    let repo_name = config
        .project_root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut vars = commit_vars(commit).to_vec();
    vars.extend([
        ("code_repo", code_repo.as_str()),
        ("locate_result", locate_result),
        ("change_set_example", CHANGE_SET_EXAMPLE),
        ("repo_name", repo_name.as_str()),
    ]);
    Ok(prompts::render(&template, &vars))
}

/// One model call; the reply is parsed as a change set (fence stripped).
/// A malformed change set is returned in `change_set`, not as an error.
pub async fn propose_changes(
    model: &dyn ChatModel,
    config: &Config,
    commit: &Commit,
    locate_result: &str,
) -> Result<Proposal, CodeChangeError> {
    let prompt = code_change_prompt(config, commit, locate_result)?;
    info!(commit = %commit.short_hash(), prompt_len = prompt.len(), "requesting code change");
    let reply = model.ask(&prompt).await?;
    let change_set = ChangeSet::from_json(&reply);
    Ok(Proposal { reply, change_set })
}
