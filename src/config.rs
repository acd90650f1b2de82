//! Run configuration.
//!
//! Loaded from a YAML file (`locate-patch.yaml` by default). Every field has
//! a default, so an empty or missing file yields a usable configuration.
//! The model backend is configured here and handed to each session
//! explicitly; nothing reads a process-wide default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "locate-patch.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Working tree of the target repository.
    pub project_root: PathBuf,
    /// Folder of commit data files (one commit per line).
    pub data_folder: PathBuf,
    pub results_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Summary cache, one JSON file per commit.
    pub cache_dir: PathBuf,
    /// Optional folder of prompt overrides (`<name>.txt`).
    pub prompt_dir: Option<PathBuf>,
    /// Source files to feed the model, by extension.
    pub source_extension: String,
    pub model: ModelConfig,
    pub conversation: ConversationConfig,
    pub summarize: SummarizeConfig,
    pub retrieval: RetrievalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            data_folder: PathBuf::from("data"),
            results_dir: PathBuf::from("result"),
            logs_dir: PathBuf::from("logs"),
            cache_dir: PathBuf::from("cache"),
            prompt_dir: None,
            source_extension: "java".into(),
            model: ModelConfig::default(),
            conversation: ConversationConfig::default(),
            summarize: SummarizeConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

/// Which wire protocol the backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI-compatible chat completions (GLM, DeepSeek, OpenAI).
    OpenAi,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: Provider,
    /// Model ID or alias (see `llm::types::resolve_model`).
    pub model: String,
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Retries on HTTP 429 before giving up.
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: "glm-4".into(),
            base_url: "https://open.bigmodel.cn/api/paas/v4".into(),
            api_key_env: "GLM_API_KEY".into(),
            max_tokens: 4096,
            temperature: None,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Model turns before a locate session gives up. `None` = unbounded.
    pub max_turns: Option<usize>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: Some(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizeConfig {
    /// Files summarised at once.
    pub concurrency: usize,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Chunk size in bytes.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            chunk_size: 1000,
            chunk_overlap: 20,
        }
    }
}

impl Config {
    /// Load a config file. A missing file at the default location is not an
    /// error: defaults apply.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() && path == Path::new(DEFAULT_CONFIG_FILE) {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = if contents.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.summarize.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "summarize.concurrency must be at least 1".into(),
            ));
        }
        if self.retrieval.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "retrieval.chunk_size must be at least 1".into(),
            ));
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ConfigError::Invalid(
                "retrieval.chunk_overlap must be smaller than chunk_size".into(),
            ));
        }
        if self.conversation.max_turns == Some(0) {
            return Err(ConfigError::Invalid(
                "conversation.max_turns must be at least 1 (omit it for no limit)".into(),
            ));
        }
        Ok(())
    }
}
