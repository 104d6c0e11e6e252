// Configuration management module
// TOML-backed settings for the embedding backend, chunking, sources, and domains

pub mod settings;

pub use settings::{
    Config, ConfigError, DomainConfig, GitSourceConfig, OllamaConfig, WikiSourceConfig,
};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("kb-search"))
        .ok_or(ConfigError::DirectoryError)
}
