// Configuration management module
// Layered TOML file + environment settings for every remote service

pub mod interactive;
pub mod settings;


use std::path::PathBuf;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    AgentConfig, Config, ConfigError, EmbeddingConfig, HttpConfig, IngestConfig, LlmConfig,
    VectorStoreConfig,
};

/// Overrides the configuration directory when set
pub const CONFIG_HOME_ENV: &str = "RAG_ASSISTANT_HOME";
const APP_DIR_NAME: &str = "rag-assistant";

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    resolve_config_dir(std::env::var_os(CONFIG_HOME_ENV).map(PathBuf::from))
}

fn resolve_config_dir(home_override: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match home_override {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(dir),
        _ => dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(ConfigError::DirectoryError),
    }
}
