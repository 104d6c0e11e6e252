
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use scraper::Html;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{SourceLoader, provenance_header};
use crate::config::{DomainConfig, WikiSourceConfig};
use crate::{KbError, Result};

const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Loads page bodies from a Confluence-compatible wiki via paginated CQL
/// search, stripping the storage-format HTML down to plain text.
pub struct WikiPageLoader {
    config: WikiSourceConfig,
    base_url: Url,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<PageResult>,
}

#[derive(Debug, Deserialize)]
struct PageResult {
    title: String,
    body: Option<PageBody>,
}

#[derive(Debug, Deserialize)]
struct PageBody {
    storage: Option<StorageBody>,
}

#[derive(Debug, Deserialize)]
struct StorageBody {
    value: String,
}

impl WikiPageLoader {
    #[inline]
    pub fn new(config: WikiSourceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| KbError::Config(format!("Invalid wiki base URL: {e}")))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            config,
            base_url,
            agent,
        })
    }

    fn search_url(&self, cql: &str, start: u32, limit: u32) -> Result<Url> {
        let mut url = self
            .base_url
            .join("/rest/api/content/search")
            .map_err(|e| KbError::Loader(format!("Failed to build wiki search URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("cql", cql)
            .append_pair("start", &start.to_string())
            .append_pair("limit", &limit.to_string())
            .append_pair("expand", "body.storage");
        Ok(url)
    }

    fn get(&self, url: &Url) -> Result<String> {
        let mut request = self.agent.get(url.as_str()).header("Accept", "application/json");

        if let (Some(username), Some(token)) = (&self.config.username, &self.config.api_token) {
            let credentials = BASE64.encode(format!("{username}:{token}"));
            request = request.header("Authorization", &format!("Basic {credentials}"));
        }

        request
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| KbError::Loader(format!("Wiki request to {url} failed: {e}")))
    }

    fn fetch_page_batch(&self, cql: &str, start: u32, limit: u32) -> Result<Vec<PageResult>> {
        let url = self.search_url(cql, start, limit)?;
        debug!("Searching wiki: start={} limit={}", start, limit);

        let body = self.get(&url)?;
        let response: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| KbError::Loader(format!("Failed to parse wiki search response: {e}")))?;

        Ok(response.results)
    }
}

fn build_cql(space: &str, query: Option<&str>) -> String {
    let space = escape_cql(space);
    match query {
        Some(query) if !query.trim().is_empty() => {
            let query = escape_cql(query);
            format!("space = \"{space}\" AND (text ~ \"{query}\" OR title ~ \"{query}\")")
        }
        _ => format!("space = \"{space}\""),
    }
}

fn escape_cql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Strip storage-format HTML down to whitespace-normalized plain text.
fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let text: Vec<&str> = document.root_element().text().collect();
    text.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

impl SourceLoader for WikiPageLoader {
    #[inline]
    fn name(&self) -> &str {
        "wiki"
    }

    #[inline]
    fn load(&self, domain: &DomainConfig) -> Result<String> {
        let Some(space) = &domain.wiki_space else {
            debug!("Domain '{}' has no wiki space configured", domain.name);
            return Ok(String::new());
        };

        let cql = build_cql(space, domain.wiki_query.as_deref());
        let limit = self.config.page_limit;
        let max_pages = self.config.max_pages as usize;

        let mut output = String::new();
        let mut fetched = 0usize;
        let mut start = 0u32;

        loop {
            let results = self.fetch_page_batch(&cql, start, limit)?;
            let batch_len = results.len();

            for page in results {
                let html = page
                    .body
                    .and_then(|b| b.storage)
                    .map(|s| s.value)
                    .unwrap_or_default();
                let text = html_to_text(&html);
                if text.is_empty() {
                    continue;
                }
                output.push_str(&provenance_header(&format!("Wiki page: {}", page.title)));
                output.push_str(&text);
                output.push_str("\n\n");
            }

            fetched += batch_len;
            if batch_len < limit as usize || fetched >= max_pages {
                break;
            }
            start += limit;
        }

        info!(
            "Loaded {} wiki pages ({} characters) for domain '{}'",
            fetched,
            output.len(),
            domain.name
        );
        Ok(output)
    }
}
