//! Single-shot locate over retrieved file summaries.

use serde_json::Value;
use tracing::{info, warn};

use super::commit_vars;
use super::prompts::{self, PromptError, Template};
use crate::commits::Commit;
use crate::config::Config;
use crate::conversation::controller::extract_json_array;
use crate::embedding::Retriever;
use crate::llm::client::LlmError;
use crate::llm::ChatModel;

/// Artifact stage name.
pub const STAGE: &str = "rag_locate";

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("model call failed: {0}")]
    Model(#[from] LlmError),
}

/// The model's reply and the locate result parsed from it, if any.
#[derive(Debug)]
pub struct RagAnswer {
    pub reply: String,
    pub result: Option<Value>,
}

/// Retrieval query for a commit.
pub fn query(commit: &Commit) -> String {
    format!("{} {}", commit.kind, commit.message)
}

pub fn rag_prompt(template: &str, commit: &Commit, passages: &[String]) -> String {
    let context = passages.join("\n\n");
    let mut vars = commit_vars(commit).to_vec();
    vars.push(("context", context.as_str()));
    prompts::render(template, &vars)
}

pub async fn rag_locate(
    model: &dyn ChatModel,
    retriever: &dyn Retriever,
    config: &Config,
    commit: &Commit,
) -> Result<RagAnswer, RagError> {
    let template = prompts::load_template(Template::RagLocate, config.prompt_dir.as_deref())?;
    let passages = retriever.retrieve(&query(commit), config.retrieval.top_k);
    info!(passages = passages.len(), top_k = config.retrieval.top_k, "retrieved context");

    let reply = model.ask(&rag_prompt(&template, commit, &passages)).await?;
    let result = extract_json_array(&reply);
    if result.is_none() {
        warn!("reply carried no JSON locate result");
    }
    Ok(RagAnswer { reply, result })
}
