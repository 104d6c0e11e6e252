#[cfg(test)]
mod tests;

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{SourceLoader, provenance_header};
use crate::config::{DomainConfig, GitSourceConfig};
use crate::{KbError, Result};

const GITHUB_API_BASE: &str = "https://api.github.com";
const REQUEST_TIMEOUT_SECONDS: u64 = 30;
const USER_AGENT: &str = concat!("kb-search/", env!("CARGO_PKG_VERSION"));

/// Loads markdown documentation from a version-controlled repository via
/// the GitHub contents API, walking the configured directory paths
/// recursively.
pub struct GitMarkdownLoader {
    config: GitSourceConfig,
    api_base: Url,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    download_url: Option<String>,
}

impl GitMarkdownLoader {
    #[inline]
    pub fn new(config: GitSourceConfig) -> Result<Self> {
        let api_base = Url::parse(GITHUB_API_BASE)
            .map_err(|e| KbError::Config(format!("Invalid git API base URL: {e}")))?;
        Ok(Self::with_api_base(config, api_base))
    }

    /// Point the loader at a different API host (used by tests and
    /// GitHub Enterprise deployments).
    #[inline]
    pub fn with_api_base(config: GitSourceConfig, api_base: Url) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECONDS)))
            .build()
            .into();

        Self {
            config,
            api_base,
            agent,
        }
    }

    fn contents_url(&self, path: &str) -> Result<Url> {
        let mut url = self
            .api_base
            .join(&format!(
                "/repos/{}/{}/contents/{}",
                self.config.owner, self.config.repo, path
            ))
            .map_err(|e| KbError::Loader(format!("Failed to build contents URL: {e}")))?;
        url.query_pairs_mut().append_pair("ref", &self.config.branch);
        Ok(url)
    }

    fn get(&self, url: &str) -> Result<String> {
        let mut request = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");

        if let Some(token) = &self.config.token {
            request = request.header("Authorization", &format!("Bearer {token}"));
        }

        request
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| KbError::Loader(format!("Git API request to {url} failed: {e}")))
    }

    /// Recursively collect markdown file contents under `path`.
    fn walk_directory(&self, path: &str, output: &mut String) -> Result<()> {
        let url = self.contents_url(path)?;
        debug!("Listing repository directory: {}", path);

        let body = self.get(url.as_str())?;
        let entries: Vec<ContentsEntry> = serde_json::from_str(&body)
            .map_err(|e| KbError::Loader(format!("Failed to parse contents listing: {e}")))?;

        for entry in entries {
            match entry.kind.as_str() {
                "dir" => self.walk_directory(&entry.path, output)?,
                "file" if is_markdown(&entry.path) => {
                    let Some(download_url) = entry.download_url else {
                        warn!("Markdown file {} has no download URL, skipping", entry.path);
                        continue;
                    };
                    let content = self.get(&download_url)?;
                    output.push_str(&provenance_header(&entry.path));
                    output.push_str(&content);
                    output.push_str("\n\n");
                }
                _ => {}
            }
        }

        Ok(())
    }
}

fn is_markdown(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with(".md") || lower.ends_with(".markdown")
}

impl SourceLoader for GitMarkdownLoader {
    #[inline]
    fn name(&self) -> &str {
        "git"
    }

    #[inline]
    fn load(&self, domain: &DomainConfig) -> Result<String> {
        if domain.git_paths.is_empty() {
            debug!("Domain '{}' has no git paths configured", domain.name);
            return Ok(String::new());
        }

        let mut output = String::new();
        for path in &domain.git_paths {
            self.walk_directory(path, &mut output)?;
        }

        info!(
            "Loaded {} characters from git for domain '{}'",
            output.len(),
            domain.name
        );
        Ok(output)
    }
}
