
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::{KbError, Result};

/// Configuration for fixed-window content chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared between adjacent windows
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 100,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        if self.overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(self.overlap, self.chunk_size));
        }
        Ok(())
    }
}

/// Split text into overlapping fixed-size character windows.
///
/// Each window holds `chunk_size` characters and shares `overlap`
/// characters with its predecessor; the final window is truncated at the
/// end of the text. Windows ignore word and sentence boundaries, a
/// deliberate trade of retrieval precision for simplicity and speed.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    // overlap >= chunk_size would stall the window advance
    config
        .validate()
        .map_err(|e| KbError::Config(e.to_string()))?;

    if text.is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= config.chunk_size {
        return Ok(vec![text.to_string()]);
    }

    let stride = config.chunk_size - config.overlap;
    let mut chunks = Vec::with_capacity(chars.len() / stride + 1);
    let mut start = 0;

    while start < chars.len() {
        let end = (start + config.chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += stride;
    }

    debug!(
        "Chunked {} characters into {} chunks (size {}, overlap {})",
        chars.len(),
        chunks.len(),
        config.chunk_size,
        config.overlap
    );

    Ok(chunks)
}
