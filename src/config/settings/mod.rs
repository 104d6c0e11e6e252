
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    pub git: Option<GitSourceConfig>,
    pub wiki: Option<WikiSourceConfig>,
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

/// Coordinates of the version-controlled markdown corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitSourceConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Personal access token for private repositories
    pub token: Option<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

/// Connection settings for the wiki service (Confluence-compatible REST API).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WikiSourceConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub api_token: Option<String>,
    /// Page size for paginated CQL search requests
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Upper bound on pages fetched per domain rebuild
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_page_limit() -> u32 {
    25
}

fn default_max_pages() -> u32 {
    200
}

/// A statically configured subject domain: its routing keywords and the
/// source locations its index is built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainConfig {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Repository directory paths holding this domain's markdown docs
    #[serde(default)]
    pub git_paths: Vec<String>,
    /// Wiki space key to search for this domain
    pub wiki_space: Option<String>,
    /// Optional extra CQL text filter for the wiki search
    pub wiki_query: Option<String>,
    /// Directory of local office documents for this domain
    pub local_docs_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid wiki page limit: {0} (must be between 1 and 500)")]
    InvalidPageLimit(u32),
    #[error("Invalid wiki max pages: {0} (must be greater than zero)")]
    InvalidMaxPages(u32),
    #[error("Invalid chunk size: {0} (must be greater than zero)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("No domains configured (at least one [[domains]] entry is required)")]
    NoDomains,
    #[error("Domain name cannot be empty")]
    EmptyDomainName,
    #[error("Duplicate domain name: {0}")]
    DuplicateDomain(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                ollama: OllamaConfig::default(),
                chunking: ChunkingConfig::default(),
                git: None,
                wiki: None,
                domains: Vec::new(),
                base_dir: config_dir.as_ref().to_path_buf(),
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.chunking.validate()?;
        if let Some(wiki) = &self.wiki {
            wiki.validate()?;
        }
        self.validate_domains()?;
        Ok(())
    }

    fn validate_domains(&self) -> Result<(), ConfigError> {
        if self.domains.is_empty() {
            return Err(ConfigError::NoDomains);
        }

        let mut seen = std::collections::HashSet::new();
        for domain in &self.domains {
            if domain.name.trim().is_empty() {
                return Err(ConfigError::EmptyDomainName);
            }
            if !seen.insert(domain.name.as_str()) {
                return Err(ConfigError::DuplicateDomain(domain.name.clone()));
            }
        }

        Ok(())
    }

    #[inline]
    pub fn domain(&self, name: &str) -> Option<&DomainConfig> {
        self.domains.iter().find(|d| d.name == name)
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Directory holding the per-domain LanceDB tables
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.base_dir.join("vectors")
    }

    /// Pointer file mapping each domain to its active index generation
    #[inline]
    pub fn manifest_path(&self) -> PathBuf {
        self.base_dir.join("manifest.json")
    }
}

impl WikiSourceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // page_limit = 0 would stall the pagination loop
        if self.page_limit == 0 || self.page_limit > 500 {
            return Err(ConfigError::InvalidPageLimit(self.page_limit));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::InvalidMaxPages(self.max_pages));
        }
        Ok(())
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}
