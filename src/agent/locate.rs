//! Interactive locate session: which functions does a commit touch?

use tracing::info;

use super::commit_vars;
use super::prompts::{self, PromptError, Template};
use crate::commits::Commit;
use crate::config::Config;
use crate::conversation::{AnswerSource, Controller, Session};
use crate::llm::ChatModel;
use crate::tools::{usage_instructions, FileViewer};

/// Artifact stage name.
pub const STAGE: &str = "locate_with_questions";

/// Seed prompt: commit, full code listing, then tool usage.
pub fn locate_prompt(config: &Config, commit: &Commit, viewer: &FileViewer) -> Result<String, PromptError> {
    let template = prompts::load_template(Template::LocateWithQuestions, config.prompt_dir.as_deref())?;
    let code_repo = prompts::code_repo_listing(&config.project_root, &config.source_extension)?;

    let mut vars = commit_vars(commit).to_vec();
    vars.push(("code_repo", code_repo.as_str()));
    let prompt = prompts::render(&template, &vars);

    Ok(format!("{prompt}\n\n{}", usage_instructions(&[viewer])))
}

/// Run a locate session for `commit` against the checked-out tree.
pub async fn locate(
    model: &dyn ChatModel,
    config: &Config,
    commit: &Commit,
    answers: &mut dyn AnswerSource,
) -> Result<Session, PromptError> {
    let viewer = FileViewer::new(&config.project_root);
    let prompt = locate_prompt(config, commit, &viewer)?;
    info!(commit = %commit.short_hash(), prompt_len = prompt.len(), "starting locate session");

    Ok(Controller::new(model, &viewer)
        .with_max_turns(config.conversation.max_turns)
        .run(prompt, answers)
        .await)
}
