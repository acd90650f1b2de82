//! locate-patch: find the code a commit touches by talking to an LLM, then
//! apply the change set it proposes.
//!
//! - `conversation`: reply classification, tool calls and the locate loop
//! - `tools`: what the model may call (file viewer)
//! - `patch`: change-set interpreter over a tree-sitter declaration table
//! - `pipeline`: checkout → locate → code change → patch
//! - `agent`: prompts and the model-facing stages
//! - `llm`, `embedding`, `git`, `commits`, `artifacts`, `config`: plumbing

pub mod agent;
pub mod artifacts;
pub mod commits;
pub mod config;
pub mod conversation;
pub mod embedding;
pub mod git;
pub mod llm;
pub mod patch;
pub mod pipeline;
pub mod tools;
pub mod treesitter;
