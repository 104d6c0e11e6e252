
use tracing::debug;

use crate::config::DomainConfig;

/// Routes a query to a subject domain by counting keyword occurrences.
///
/// This is a best-effort heuristic, not a classifier: domain vocabularies
/// are disjoint by construction in the target corpora, so a cheap
/// substring count is enough and avoids a second model call. Mixed or
/// unrecognized vocabulary falls back to `None`, which callers treat as
/// "search every domain".
#[derive(Debug, Clone)]
pub struct DomainRouter {
    tables: Vec<KeywordTable>,
}

#[derive(Debug, Clone)]
struct KeywordTable {
    domain: String,
    keywords: Vec<String>,
}

impl DomainRouter {
    #[inline]
    pub fn new(domains: &[DomainConfig]) -> Self {
        let tables = domains
            .iter()
            .map(|d| KeywordTable {
                domain: d.name.clone(),
                keywords: d
                    .keywords
                    .iter()
                    .filter(|k| !k.trim().is_empty())
                    .map(|k| k.to_lowercase())
                    .collect(),
            })
            .collect();
        Self { tables }
    }

    /// Detect the subject domain of a query, or `None` when no domain
    /// scores strictly higher than the rest (including the all-zero case).
    #[inline]
    pub fn detect(&self, query: &str) -> Option<&str> {
        let query = query.to_lowercase();

        let mut best: Option<(&str, usize)> = None;
        let mut tied = false;

        for table in &self.tables {
            let score: usize = table
                .keywords
                .iter()
                .map(|k| query.matches(k.as_str()).count())
                .sum();

            debug!("Domain '{}' scored {} for query", table.domain, score);

            match best {
                Some((_, best_score)) if score > best_score => {
                    best = Some((table.domain.as_str(), score));
                    tied = false;
                }
                Some((_, best_score)) if score == best_score => {
                    tied = true;
                }
                None => {
                    best = Some((table.domain.as_str(), score));
                    tied = false;
                }
                _ => {}
            }
        }

        match best {
            Some((domain, score)) if score > 0 && !tied => Some(domain),
            _ => None,
        }
    }
}
