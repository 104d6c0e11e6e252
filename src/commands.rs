use anyhow::Context;
use tracing::info;

use crate::Result;
use crate::config::{Config, get_config_dir};
use crate::embeddings::ollama::OllamaEmbedder;
use crate::service::{KnowledgeService, NOT_FOUND_SENTINEL};

fn load_config() -> Result<Config> {
    let config_dir = get_config_dir().map_err(|e| crate::KbError::Config(e.to_string()))?;
    Ok(Config::load(&config_dir)?)
}

/// Rebuild the vector index for one domain, or all of them.
#[inline]
pub async fn rebuild(domain: Option<String>) -> Result<()> {
    let config = load_config()?;
    let service = KnowledgeService::from_config(config).await?;

    info!("Starting knowledge base rebuild");
    service.rebuild_knowledge(domain.as_deref()).await?;

    match domain {
        Some(name) => println!("Rebuilt knowledge base for domain '{name}'."),
        None => println!("Rebuilt knowledge base for all configured domains."),
    }
    Ok(())
}

/// Run a retrieval query and print the context string.
#[inline]
pub async fn search(query: String, limit: usize, domain: Option<String>) -> Result<()> {
    let config = load_config()?;
    let service = KnowledgeService::from_config(config).await?;

    let context = service
        .search_relevant_knowledge(&query, limit, domain.as_deref())
        .await?;

    if context == NOT_FOUND_SENTINEL {
        println!("{context}");
    } else {
        println!("Retrieved context:\n");
        println!("{context}");
    }
    Ok(())
}

/// Report embedding backend health and per-domain index sizes.
#[inline]
pub async fn show_status() -> Result<()> {
    let config = load_config()?;

    println!("Embedding backend:");
    let embedder = OllamaEmbedder::new(&config.ollama)?;
    match embedder.health_check() {
        Ok(()) => println!(
            "  OK ({}://{}:{}, model {})",
            config.ollama.protocol, config.ollama.host, config.ollama.port, config.ollama.model
        ),
        Err(e) => println!("  UNAVAILABLE: {e}"),
    }

    if config.domains.is_empty() {
        println!("\nNo domains configured.");
        println!("Add [[domains]] entries to {}", config.config_file_path().display());
        return Ok(());
    }

    let service = KnowledgeService::from_config(config).await?;

    println!("\nDomains:");
    for domain in &service.config().domains {
        let chunks = service.indexed_chunks(&domain.name).await?;
        println!(
            "  {}: {} chunks indexed, {} keywords",
            domain.name,
            chunks,
            domain.keywords.len()
        );
    }

    Ok(())
}

/// Print the active configuration as TOML.
#[inline]
pub fn show_config() -> Result<()> {
    let config = load_config()?;
    let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;

    println!("Configuration file: {}", config.config_file_path().display());
    println!();
    println!("{content}");
    Ok(())
}
