// Source loaders
// Each loader pulls raw text for one domain from an external system and
// tags it with provenance separators.

pub mod git;
pub mod local;
pub mod wiki;

pub use git::GitMarkdownLoader;
pub use local::LocalDocumentLoader;
pub use wiki::WikiPageLoader;

use crate::Result;
use crate::config::DomainConfig;

/// Pulls raw text for a subject domain from one external source.
///
/// An empty string means the domain has no sources configured for this
/// loader or the sources held no text; that is not an error. Transport
/// and API failures surface as `KbError::Loader` and are absorbed (with
/// a warning) by the orchestrator, which continues with the remaining
/// loaders.
pub trait SourceLoader: Send + Sync {
    fn name(&self) -> &str;
    fn load(&self, domain: &DomainConfig) -> Result<String>;
}

/// Provenance separator prepended to each loaded document or page.
pub(crate) fn provenance_header(tag: &str) -> String {
    format!("--- {tag} ---\n")
}
