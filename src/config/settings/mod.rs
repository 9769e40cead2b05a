
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::database::{Distance, VectorBackend};
use crate::embeddings::chunking::ChunkingConfig;
use crate::embeddings::gemini::{
    DEFAULT_EMBEDDING_BASE_URL, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL,
    MAX_BATCH_SIZE, TaskType,
};
use crate::http::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_TIMEOUT_SECONDS};
use crate::indexer::{DEFAULT_ID_OFFSET, IdStrategy};

pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_LLM_BASE_URL: &str = "LLM_BASE_URL";
pub const ENV_MODEL_NAME: &str = "MODEL_NAME";
pub const ENV_QDRANT_URL: &str = "QDRANT_URL";
pub const ENV_QDRANT_API_KEY: &str = "QDRANT_API_KEY";
pub const ENV_COLLECTION_NAME: &str = "COLLECTION_NAME";
pub const ENV_EMBED_MODEL: &str = "EMBED_MODEL";
pub const ENV_CHUNK_SIZE: &str = "CHUNK_SIZE";
pub const ENV_CHUNK_OVERLAP: &str = "CHUNK_OVERLAP";

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
pub const DEFAULT_COLLECTION_NAME: &str = "gemini-embeddings";
pub const DEFAULT_DOCUMENT_PATH: &str = "comprehensive_guide_daca.md";
pub const DEFAULT_AGENT_NAME: &str = "DACA Assistant";
pub const DEFAULT_AGENT_INSTRUCTIONS: &str = "You are a DACA Assistant you all info in this rag system of tools, it have all information, you first look info in tools, if it has so give simplified answer according to knowlegebase";
pub const DEFAULT_GREETING: &str = "Welcome to the  DACA Chatbot! How can I Guide you?";
pub const DEFAULT_MAX_TURNS: u32 = 10;
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// OpenAI-compatible chat completions endpoint used by the agent
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub task_type: TaskType,
    pub dimension: u32,
    pub batch_size: u32,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EMBEDDING_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            task_type: TaskType::default(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            batch_size: MAX_BATCH_SIZE,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    pub url: String,
    pub collection: String,
    pub distance: Distance,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::default(),
            url: DEFAULT_QDRANT_URL.to_string(),
            collection: DEFAULT_COLLECTION_NAME.to_string(),
            distance: Distance::default(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub document: PathBuf,
    pub id_strategy: IdStrategy,
    pub id_offset: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            document: PathBuf::from(DEFAULT_DOCUMENT_PATH),
            id_strategy: IdStrategy::default(),
            id_offset: DEFAULT_ID_OFFSET,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub instructions: String,
    pub greeting: String,
    pub max_turns: u32,
    pub top_k: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            instructions: DEFAULT_AGENT_INSTRUCTIONS.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid collection name: {0:?} (cannot be empty)")]
    InvalidCollection(String),
    #[error("Invalid batch size: {0} (must be between 1 and 100)")]
    InvalidBatchSize(u32),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 8192)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    ChunkOverlapTooLarge(usize, usize),
    #[error("Invalid max turns: {0} (must be at least 1)")]
    InvalidMaxTurns(u32),
    #[error("Invalid top_k: {0} (must be at least 1)")]
    InvalidTopK(usize),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Missing credential: set the {0} environment variable")]
    MissingCredential(&'static str),
    #[error("Missing setting: set the {0} environment variable")]
    MissingSetting(&'static str),
    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnvValue { name: &'static str, value: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load `config.toml` from `config_dir`, then apply environment overrides
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        Self::load_with_env(config_dir, |name| std::env::var(name).ok())
    }

    /// Like [`Config::load`], reading overrides through `lookup` instead of the
    /// process environment
    #[inline]
    pub fn load_with_env<P, F>(config_dir: P, lookup: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load_file(&config_dir)?;
        config.apply_env(lookup)?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Read only the file layer; defaults fill in everything it omits
    #[inline]
    pub fn load_file<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            debug!("No config file at {}, using defaults", config_path.display());
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        Ok(config)
    }

    /// Overlay the environment variables on top of the current settings.
    /// Empty values count as unset.
    #[inline]
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = get(ENV_GEMINI_API_KEY) {
            self.llm.api_key = Some(key.clone());
            self.embedding.api_key = Some(key);
        }
        if let Some(base_url) = get(ENV_LLM_BASE_URL) {
            self.llm.base_url = Some(base_url);
        }
        if let Some(model) = get(ENV_MODEL_NAME) {
            self.llm.model = Some(model);
        }
        if let Some(url) = get(ENV_QDRANT_URL) {
            self.vector_store.url = url;
        }
        if let Some(key) = get(ENV_QDRANT_API_KEY) {
            self.vector_store.api_key = Some(key);
        }
        if let Some(collection) = get(ENV_COLLECTION_NAME) {
            self.vector_store.collection = collection;
        }
        if let Some(model) = get(ENV_EMBED_MODEL) {
            self.embedding.model = model;
        }
        if let Some(value) = get(ENV_CHUNK_SIZE) {
            self.chunking.chunk_size = parse_env(ENV_CHUNK_SIZE, &value)?;
        }
        if let Some(value) = get(ENV_CHUNK_OVERLAP) {
            self.chunking.chunk_overlap = parse_env(ENV_CHUNK_OVERLAP, &value)?;
        }

        Ok(())
    }

    /// Write the file layer. Credentials are never serialized.
    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.llm.validate()?;
        self.embedding.validate()?;
        self.vector_store.validate()?;
        self.chunking.validate()?;
        self.agent.validate()?;
        self.http.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Directory holding the embedded vector tables
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }
}

impl LlmConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base_url) = &self.base_url {
            validate_url(base_url)?;
        }
        match &self.model {
            Some(model) if model.trim().is_empty() => Err(ConfigError::InvalidModel(model.clone())),
            _ => Ok(()),
        }
    }

    /// Base URL, model and key, all of which a chat session needs
    #[inline]
    pub fn require(&self) -> Result<(&str, &str, &str), ConfigError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential(ENV_GEMINI_API_KEY))?;
        let base_url = self
            .base_url
            .as_deref()
            .ok_or(ConfigError::MissingSetting(ENV_LLM_BASE_URL))?;
        let model = self
            .model
            .as_deref()
            .ok_or(ConfigError::MissingSetting(ENV_MODEL_NAME))?;
        Ok((base_url, model, api_key))
    }

    #[inline]
    pub fn set_base_url(&mut self, base_url: String) -> Result<(), ConfigError> {
        validate_url(&base_url)?;
        self.base_url = Some(base_url);
        Ok(())
    }

    #[inline]
    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = Some(model);
        Ok(())
    }
}

impl EmbeddingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.base_url)?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(1..=8192).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        Ok(())
    }

    #[inline]
    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    #[inline]
    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }

    #[inline]
    pub fn set_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(1..=8192).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.dimension = dimension;
        Ok(())
    }
}

impl VectorStoreConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.url)?;
        if self.collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollection(self.collection.clone()));
        }
        Ok(())
    }

    #[inline]
    pub fn set_url(&mut self, url: String) -> Result<(), ConfigError> {
        validate_url(&url)?;
        self.url = url;
        Ok(())
    }

    #[inline]
    pub fn set_collection(&mut self, collection: String) -> Result<(), ConfigError> {
        if collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollection(collection));
        }
        self.collection = collection;
        Ok(())
    }
}

impl AgentConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_turns == 0 {
            return Err(ConfigError::InvalidMaxTurns(self.max_turns));
        }
        if self.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }
        Ok(())
    }
}

impl HttpConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }
        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }
        Ok(())
    }
}

fn validate_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(ConfigError::InvalidUrl(raw.to_string())),
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvValue {
            name,
            value: value.to_string(),
        })
}
