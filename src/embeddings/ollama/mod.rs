#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::OllamaConfig;
use crate::{KbError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Maps text to fixed-length embedding vectors.
///
/// The batch form exists purely for throughput and must produce the same
/// vector per item as the single form. A backend failure surfaces as
/// `KbError::Embedding`; implementations never substitute zero vectors.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Blocking client for the Ollama embedding API
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: Url,
    model: String,
    batch_size: u32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    model: String,
    #[serde(rename = "input")]
    inputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .map_err(|e| KbError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: config.batch_size,
            agent,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    /// Test connection to the Ollama server and verify model availability
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        self.ping()?;
        self.validate_model()?;

        info!(
            "Health check passed for Ollama server at {} with model {}",
            self.base_url, self.model
        );
        Ok(())
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self.join_url("/api/tags")?;
        debug!("Pinging Ollama server at {}", url);

        self.get(&url)
            .map_err(|e| KbError::Embedding(format!("Failed to ping Ollama server: {e}")))?;

        debug!("Server ping successful");
        Ok(())
    }

    /// Validate that the configured model is available
    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        let models = self.list_models()?;

        if models.iter().any(|m| m.name == self.model) {
            debug!("Model {} is available", self.model);
            Ok(())
        } else {
            let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available
            );
            Err(KbError::Embedding(format!(
                "Model '{}' is not available. Available models: {:?}",
                self.model, available
            )))
        }
    }

    /// List all models available on the server
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.join_url("/api/tags")?;
        debug!("Fetching available models from {}", url);

        let response_text = self
            .get(&url)
            .map_err(|e| KbError::Embedding(format!("Failed to fetch models: {e}")))?;

        let models_response: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| KbError::Embedding(format!("Failed to parse models response: {e}")))?;

        Ok(models_response.models)
    }

    fn join_url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| KbError::Embedding(format!("Failed to build URL for {path}: {e}")))
    }

    fn get(&self, url: &Url) -> std::result::Result<String, ureq::Error> {
        self.agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
    }

    fn post_json(&self, url: &Url, body: &str) -> Result<String> {
        self.agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| KbError::Embedding(format!("Embedding request failed: {e}")))
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.len() == 1 {
            return Ok(vec![self.embed(&texts[0])?]);
        }

        let request = BatchEmbedRequest {
            model: self.model.clone(),
            inputs: texts.to_vec(),
        };

        let url = self.join_url("/api/embed")?;
        let request_json = serde_json::to_string(&request)
            .map_err(|e| KbError::Embedding(format!("Failed to serialize batch request: {e}")))?;

        let response_text = self.post_json(&url, &request_json)?;

        let batch_response: BatchEmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| KbError::Embedding(format!("Failed to parse batch response: {e}")))?;

        if batch_response.embeddings.len() != texts.len() {
            return Err(KbError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                batch_response.embeddings.len()
            )));
        }

        Ok(batch_response.embeddings)
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let url = self.join_url("/api/embed")?;
        let request_json = serde_json::to_string(&request)
            .map_err(|e| KbError::Embedding(format!("Failed to serialize request: {e}")))?;

        let response_text = self.post_json(&url, &request_json)?;

        let embed_response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| KbError::Embedding(format!("Failed to parse embedding response: {e}")))?;

        debug!(
            "Generated embedding with {} dimensions",
            embed_response.embedding.len()
        );

        Ok(embed_response.embedding)
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());

        // Cap request sizes so a large rebuild does not overwhelm the server
        for batch in texts.chunks(self.batch_size as usize) {
            let batch_results = self.embed_single_batch(batch)?;
            results.extend(batch_results);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }
}
