use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{eid::Eid, semantic};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_EXTERNAL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_TOP_K: usize = 6;
const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Upload chunking, in words
const DEFAULT_CHUNK_SIZE: usize = 400;
const DEFAULT_CHUNK_OVERLAP: usize = 50;

const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_MAX_TOKENS: u32 = 1000;

const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Fragments handed to the model per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Most recent chat messages included with each question
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    OpenAi,
    /// fastembed model on this machine
    Local,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default)]
    pub provider: EmbeddingBackend,

    /// Model name. Local models: all-MiniLM-L6-v2, bge-small-en-v1.5,
    /// bge-base-en-v1.5, bge-large-en-v1.5
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Only used by the openai provider; local models report their own size
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::default(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            base_url: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_completion_model(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_transcription_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: default_transcription_model(),
            base_url: None,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

fn default_embedding_model() -> String {
    semantic::openai::DEFAULT_MODEL.to_string()
}

fn default_embedding_dimensions() -> usize {
    semantic::openai::DEFAULT_DIMENSIONS
}

fn default_completion_model() -> String {
    DEFAULT_COMPLETION_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_transcription_model() -> String {
    DEFAULT_TRANSCRIPTION_MODEL.to_string()
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_external_timeout_secs() -> u64 {
    DEFAULT_EXTERNAL_TIMEOUT_SECS
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Upper bound on any single embedding, completion or transcription call
    #[serde(default = "default_external_timeout_secs")]
    pub external_timeout_secs: u64,

    /// Environment variable holding the API key for hosted providers
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            external_timeout_secs: DEFAULT_EXTERNAL_TIMEOUT_SECS,
            api_key_env: default_api_key_env(),
            retrieval: RetrievalConfig::default(),
            chunking: ChunkingConfig::default(),
            embeddings: EmbeddingsConfig::default(),
            completion: CompletionConfig::default(),
            transcription: TranscriptionConfig::default(),
            base_path: PathBuf::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.retrieval.top_k == 0 {
            return invalid("retrieval.top_k must be greater than 0".into());
        }
        if self.retrieval.history_window == 0 {
            return invalid("retrieval.history_window must be greater than 0".into());
        }

        let chunking = &self.chunking;
        if chunking.chunk_size == 0 || chunking.overlap >= chunking.chunk_size {
            return invalid(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                chunking.overlap, chunking.chunk_size
            ));
        }

        if self.external_timeout_secs == 0 {
            return invalid("external_timeout_secs must be greater than 0".into());
        }

        if self.embeddings.provider == EmbeddingBackend::OpenAi && self.embeddings.dimensions == 0 {
            return invalid("embeddings.dimensions must be greater than 0".into());
        }

        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return invalid(format!(
                "completion.temperature must be between 0.0 and 2.0, got {}",
                self.completion.temperature
            ));
        }

        Ok(())
    }

    /// `$LECTERN_BASE_PATH`, or `~/.local/share/lectern`.
    pub fn default_base_path() -> anyhow::Result<PathBuf> {
        if let Ok(path) = std::env::var("LECTERN_BASE_PATH") {
            return Ok(PathBuf::from(path));
        }

        let home = homedir::my_home()?
            .ok_or_else(|| anyhow::anyhow!("couldn't find home dir"))?;
        Ok(home.join(".local/share/lectern"))
    }

    /// Load `config.yaml` from `base_path`, writing defaults on first run.
    pub fn load_with(base_path: &Path) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(base_path)?;
        let path = base_path.join(CONFIG_FILE);

        if !path.exists() {
            log::info!("writing default config to {}", path.display());
            write_atomic(&path, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str = std::fs::read_to_string(&path)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;
        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_str = serde_yml::to_string(&self)?;
        write_atomic(&self.base_path.join(CONFIG_FILE), config_str.as_bytes())?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn external_timeout(&self) -> Duration {
        Duration::from_secs(self.external_timeout_secs)
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(CONFIG_FILE);
    let temp_path = path.with_file_name(format!("{}-{file_name}", Eid::new()));

    std::fs::write(&temp_path, data)?;
    std::fs::rename(&temp_path, path)
}
