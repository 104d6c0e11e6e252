#[cfg(test)]
mod tests;

use quick_xml::events::Event;
use std::io::Read as _;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{SourceLoader, provenance_header};
use crate::config::DomainConfig;
use crate::{KbError, Result};

/// Loads text from local office documents under a configured directory.
///
/// Supported formats: markdown/plain text, PDF, and DOCX. Files in other
/// formats are skipped with a warning. A file that fails to parse is also
/// skipped rather than failing the whole directory.
pub struct LocalDocumentLoader;

impl LocalDocumentLoader {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalDocumentLoader {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

fn extract_file_text(path: &Path) -> Result<Option<String>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "md" | "markdown" | "txt" => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| KbError::Loader(format!("Failed to read {}: {e}", path.display())))?;
            Ok(Some(text))
        }
        "pdf" => extract_pdf_text(path).map(Some),
        "docx" => extract_docx_text(path).map(Some),
        _ => Ok(None),
    }
}

fn extract_pdf_text(path: &Path) -> Result<String> {
    let document = lopdf::Document::load(path)
        .map_err(|e| KbError::Loader(format!("Failed to parse PDF {}: {e}", path.display())))?;

    let mut text = String::new();
    for (page_no, _page_id) in document.get_pages() {
        let page_text = document
            .extract_text(&[page_no])
            .map_err(|e| KbError::Loader(format!("Failed to extract PDF page {page_no}: {e}")))?;
        if !page_text.trim().is_empty() {
            text.push_str(&page_text);
            text.push('\n');
        }
    }

    Ok(text)
}

fn extract_docx_text(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .map_err(|e| KbError::Loader(format!("Failed to open {}: {e}", path.display())))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| KbError::Loader(format!("Failed to read DOCX archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| KbError::Loader(format!("DOCX is missing word/document.xml: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| KbError::Loader(format!("Failed to read DOCX document body: {e}")))?;

    parse_docx_body(&xml)
}

/// Pull the run text out of WordprocessingML, with paragraph breaks.
fn parse_docx_body(xml: &str) -> Result<String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_run_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_run_text => {
                let value = t
                    .unescape()
                    .map_err(|e| KbError::Loader(format!("Invalid DOCX text content: {e}")))?;
                text.push_str(&value);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(KbError::Loader(format!("Failed to parse DOCX XML: {e}")));
            }
            _ => {}
        }
    }

    Ok(text)
}

impl SourceLoader for LocalDocumentLoader {
    #[inline]
    fn name(&self) -> &str {
        "local"
    }

    #[inline]
    fn load(&self, domain: &DomainConfig) -> Result<String> {
        let Some(dir) = &domain.local_docs_dir else {
            debug!("Domain '{}' has no local docs directory", domain.name);
            return Ok(String::new());
        };

        if !dir.is_dir() {
            return Err(KbError::Loader(format!(
                "Local docs directory does not exist: {}",
                dir.display()
            )));
        }

        let mut output = String::new();
        let mut loaded = 0usize;

        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();

            match extract_file_text(path) {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    let name = entry.file_name().to_string_lossy();
                    output.push_str(&provenance_header(&name));
                    output.push_str(&text);
                    output.push_str("\n\n");
                    loaded += 1;
                }
                Ok(Some(_)) => {
                    debug!("File {} held no text, skipping", path.display());
                }
                Ok(None) => {
                    warn!("Unsupported document format, skipping: {}", path.display());
                }
                Err(e) => {
                    warn!("Failed to extract {}, skipping: {}", path.display(), e);
                }
            }
        }

        info!(
            "Loaded {} local documents ({} characters) for domain '{}'",
            loaded,
            output.len(),
            domain.name
        );
        Ok(output)
    }
}
