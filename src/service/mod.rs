
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{Config, DomainConfig};
use crate::embeddings::chunking::chunk_text;
use crate::embeddings::ollama::{EmbeddingProvider, OllamaEmbedder};
use crate::loaders::{GitMarkdownLoader, LocalDocumentLoader, SourceLoader, WikiPageLoader};
use crate::router::DomainRouter;
use crate::store::{ChunkRecord, VectorStore};
use crate::{KbError, Result};

/// Distinguished successful result for a search that matched nothing.
/// Callers use this to tell "searched, found nothing" apart from a
/// transport failure, which raises instead.
pub const NOT_FOUND_SENTINEL: &str = "No relevant knowledge found in the knowledge base.";

/// Visible separator between retrieved chunks in the context string.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Orchestrates loaders, chunking, embedding, routing, and the vector
/// store behind two public operations: rebuild an index and answer a
/// retrieval query. Holds immutable configuration and explicit handles to
/// its collaborators; no ambient global state.
pub struct KnowledgeService {
    config: Config,
    router: DomainRouter,
    loaders: Vec<Box<dyn SourceLoader>>,
    embedder: Box<dyn EmbeddingProvider>,
    store: VectorStore,
}

impl KnowledgeService {
    /// Assemble a service from explicit collaborators.
    #[inline]
    pub fn new(
        config: Config,
        loaders: Vec<Box<dyn SourceLoader>>,
        embedder: Box<dyn EmbeddingProvider>,
        store: VectorStore,
    ) -> Self {
        let router = DomainRouter::new(&config.domains);
        Self {
            config,
            router,
            loaders,
            embedder,
            store,
        }
    }

    /// Build a service with the production collaborators: the loaders
    /// enabled by the source configuration, the Ollama embedder, and a
    /// LanceDB store under the configured base directory.
    #[inline]
    pub async fn from_config(config: Config) -> Result<Self> {
        let mut loaders: Vec<Box<dyn SourceLoader>> = Vec::new();

        if let Some(git) = config.git.clone() {
            loaders.push(Box::new(GitMarkdownLoader::new(git)?));
        }
        if let Some(wiki) = config.wiki.clone() {
            loaders.push(Box::new(WikiPageLoader::new(wiki)?));
        }
        loaders.push(Box::new(LocalDocumentLoader::new()));

        let embedder = Box::new(OllamaEmbedder::new(&config.ollama)?);
        let store = VectorStore::new(
            &config.vector_database_path(),
            &config.manifest_path(),
            config.ollama.embedding_dimension as usize,
        )
        .await?;

        Ok(Self::new(config, loaders, embedder, store))
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of chunks currently indexed for a domain.
    #[inline]
    pub async fn indexed_chunks(&self, domain: &str) -> Result<usize> {
        self.store.count(domain).await
    }

    /// Rebuild the vector index for one domain, or for every configured
    /// domain when `domain` is `None`. A domain whose sources yield no
    /// text is skipped with a warning rather than treated as an error.
    #[inline]
    pub async fn rebuild_knowledge(&self, domain: Option<&str>) -> Result<()> {
        let targets: Vec<&DomainConfig> = match domain {
            Some(name) => vec![self.config.domain(name).ok_or_else(|| {
                KbError::InvalidInput(format!("Unknown domain: '{name}'"))
            })?],
            None => self.config.domains.iter().collect(),
        };

        for target in targets {
            self.rebuild_domain(target).await?;
        }

        Ok(())
    }

    async fn rebuild_domain(&self, domain: &DomainConfig) -> Result<()> {
        info!("Rebuilding knowledge base for domain '{}'", domain.name);

        let mut full_text = String::new();
        for loader in &self.loaders {
            match loader.load(domain) {
                Ok(text) if !text.trim().is_empty() => {
                    full_text.push_str(&format!(
                        "--- {} knowledge from {} ---\n",
                        domain.name,
                        loader.name()
                    ));
                    full_text.push_str(&text);
                    full_text.push_str("\n\n");
                }
                Ok(_) => {
                    debug!(
                        "Loader '{}' contributed no text for domain '{}'",
                        loader.name(),
                        domain.name
                    );
                }
                Err(e) => {
                    // A single unavailable source must not abort the rebuild
                    warn!(
                        "Loader '{}' failed for domain '{}', continuing without it: {}",
                        loader.name(),
                        domain.name,
                        e
                    );
                }
            }
        }

        if full_text.trim().is_empty() {
            warn!(
                "No source text loaded for domain '{}', skipping rebuild",
                domain.name
            );
            return Ok(());
        }

        let chunks = chunk_text(&full_text, &self.config.chunking)?;
        info!(
            "Domain '{}': {} characters chunked into {} chunks",
            domain.name,
            full_text.len(),
            chunks.len()
        );

        let vectors = self.embedder.embed_batch(&chunks)?;

        let created_at = Utc::now().to_rfc3339();
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (content, vector))| ChunkRecord {
                id: format!("{}-{}", domain.name, i),
                domain: domain.name.clone(),
                content,
                chunk_index: i as u32,
                created_at: created_at.clone(),
                vector,
            })
            .collect();

        self.store.rebuild(&domain.name, records).await
    }

    /// Retrieve a context string for a query.
    ///
    /// With an explicit or detected domain the query is served from that
    /// domain's index alone; when routing comes back unknown, every
    /// domain is searched for a share of `n_results` and the results are
    /// concatenated domain by domain. An empty result set yields
    /// [`NOT_FOUND_SENTINEL`], not an empty string.
    #[inline]
    pub async fn search_relevant_knowledge(
        &self,
        query: &str,
        n_results: usize,
        domain: Option<&str>,
    ) -> Result<String> {
        if self.config.domains.is_empty() {
            return Err(KbError::InvalidInput(
                "No domains configured".to_string(),
            ));
        }
        if query.trim().is_empty() {
            return Err(KbError::InvalidInput("Query cannot be empty".to_string()));
        }
        if n_results == 0 {
            return Err(KbError::InvalidInput(
                "n_results must be greater than zero".to_string(),
            ));
        }
        if let Some(name) = domain {
            if self.config.domain(name).is_none() {
                return Err(KbError::InvalidInput(format!("Unknown domain: '{name}'")));
            }
        }

        let resolved = domain.or_else(|| self.router.detect(query));
        let query_vector = self.embedder.embed(query)?;

        let chunks = match resolved {
            Some(name) => {
                debug!("Searching domain '{}' for {} chunks", name, n_results);
                self.store.query(name, &query_vector, n_results).await?
            }
            None => {
                // Routing came back unknown: fan out across every domain
                let per_domain = (n_results / self.config.domains.len()).max(1);
                debug!(
                    "Domain unknown, fanning out with {} results per domain",
                    per_domain
                );

                let mut collected = Vec::new();
                for domain in &self.config.domains {
                    let results = self
                        .store
                        .query(&domain.name, &query_vector, per_domain)
                        .await?;
                    collected.extend(results);
                }
                collected
            }
        };

        if chunks.is_empty() {
            info!("No relevant chunks found for query");
            return Ok(NOT_FOUND_SENTINEL.to_string());
        }

        info!("Returning context built from {} chunks", chunks.len());
        Ok(chunks.join(CONTEXT_SEPARATOR))
    }
}
