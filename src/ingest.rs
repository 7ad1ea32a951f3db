//! Document ingestion: load, split, embed, store
//!
//! Turns a file path or URL into indexed chunks with origin metadata.
//! There is no transaction across "split + embed + store": a failure part
//! way through can leave earlier chunks indexed, and the caller's source
//! catalog remains the source of truth for visibility.

use crate::chunker::split_text;
use crate::embeddings::EmbeddingService;
use crate::error::{FocusFlowError, Result};
use crate::storage::{ChunkRecord, VectorIndex};
use crate::types::SourceKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Ingests documents into the vector index
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingService>,
    index: VectorIndex,
    chunk_size: usize,
    chunk_overlap: usize,
}

/// Outcome of a URL ingestion: the display title and detected source kind
#[derive(Debug, Clone)]
pub struct UrlIngestion {
    pub title: String,
    pub kind: SourceKind,
    pub chunks: usize,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        index: VectorIndex,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            chunk_size,
            chunk_overlap,
        }
    }

    /// Ingest a local file (PDF or plain text) into the index.
    ///
    /// Returns the number of chunks stored. A missing file is an error
    /// before any work happens.
    pub async fn ingest_file(&self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Err(FocusFlowError::Ingestion(format!(
                "File not found: {}",
                path.display()
            )));
        }

        let source_path = path.to_string_lossy().to_string();
        info!("Ingesting file: {}", source_path);

        let pages = extract_file_text(path)?;

        let mut records = Vec::new();
        for (page_number, page_text) in pages {
            for chunk in split_text(&page_text, self.chunk_size, self.chunk_overlap) {
                records.push((chunk, page_number));
            }
        }

        if records.is_empty() {
            return Err(FocusFlowError::Ingestion(format!(
                "No text extracted from {}",
                source_path
            )));
        }

        self.store_chunks(records, &source_path, None).await
    }

    /// Fetch a URL, strip markup, and ingest the text.
    ///
    /// The page title becomes the display name; YouTube hosts are tagged
    /// so their citations read as "Transcript".
    pub async fn ingest_url(&self, url: &str) -> Result<UrlIngestion> {
        info!("Ingesting URL: {}", url);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(FocusFlowError::Http)?;

        let body = client
            .get(url)
            .send()
            .await
            .map_err(FocusFlowError::Http)?
            .error_for_status()
            .map_err(|e| FocusFlowError::Ingestion(format!("Failed to fetch {}: {}", url, e)))?
            .text()
            .await
            .map_err(FocusFlowError::Http)?;

        let kind = classify_url(url);
        let title = extract_title(&body).unwrap_or_else(|| url.to_string());
        let text = strip_html_tags(&body);

        if text.trim().is_empty() {
            return Err(FocusFlowError::Ingestion(format!(
                "No text extracted from {}",
                url
            )));
        }

        let records: Vec<(String, u32)> = split_text(&text, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .map(|chunk| (chunk, 0))
            .collect();

        let chunks = self
            .store_chunks(records, url, Some(title.clone()))
            .await?;

        Ok(UrlIngestion {
            title,
            kind,
            chunks,
        })
    }

    /// Remove a document's chunks by exact source-path match.
    ///
    /// Failures are logged and swallowed; the catalog's soft delete is the
    /// authority on visibility.
    pub async fn delete_document(&self, source_path: &str) {
        if let Err(e) = self.index.delete_by_source(source_path).await {
            warn!("Failed to delete chunks for {}: {}", source_path, e);
        }
    }

    async fn store_chunks(
        &self,
        chunks: Vec<(String, u32)>,
        source_path: &str,
        title: Option<String>,
    ) -> Result<usize> {
        let texts: Vec<&str> = chunks.iter().map(|(text, _)| text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|((content, page), embedding)| ChunkRecord {
                content,
                source_path: source_path.to_string(),
                page: if title.is_some() { None } else { Some(page) },
                title: title.clone(),
                embedding,
            })
            .collect();

        let count = self.index.add_chunks(records).await?;
        info!("Ingested {} chunks from {}", count, source_path);
        Ok(count)
    }
}

/// Extract text from a local file, page by page.
///
/// PDFs go through pdf-extract; pages are recovered from form feeds in
/// its output. Anything else is treated as plain text with a single page.
fn extract_file_text(path: &Path) -> Result<Vec<(u32, String)>> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if is_pdf {
        let bytes = std::fs::read(path)?;
        let text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| FocusFlowError::Ingestion(format!("PDF extraction failed: {}", e)))?;

        let pages: Vec<(u32, String)> = text
            .split('\u{c}')
            .enumerate()
            .map(|(i, page)| (i as u32 + 1, page.to_string()))
            .filter(|(_, page)| !page.trim().is_empty())
            .collect();

        if pages.is_empty() {
            return Err(FocusFlowError::Ingestion(format!(
                "No text extracted from {}",
                path.display()
            )));
        }
        Ok(pages)
    } else {
        let text = std::fs::read_to_string(path)?;
        Ok(vec![(1, text)])
    }
}

/// Classify a URL as a plain web page or a YouTube video
pub fn classify_url(url: &str) -> SourceKind {
    let lower = url.to_lowercase();
    if lower.contains("youtube.com/") || lower.contains("youtu.be/") {
        SourceKind::Youtube
    } else {
        SourceKind::Url
    }
}

/// Case-insensitive ASCII substring search returning a byte offset
fn find_ignore_case(haystack: &str, from: usize, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < from + n.len() {
        return None;
    }
    (from..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// Pull the contents of the first `<title>` element, if any
fn extract_title(html: &str) -> Option<String> {
    let start = find_ignore_case(html, 0, "<title")?;
    let open_end = html[start..].find('>')? + start + 1;
    let close = find_ignore_case(html, open_end, "</title>")?;
    let title = html[open_end..close].trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Case-insensitive ASCII prefix check on a byte offset
fn starts_with_ignore_case(haystack: &str, at: usize, needle: &str) -> bool {
    haystack
        .as_bytes()
        .get(at..at + needle.len())
        .map(|slice| slice.eq_ignore_ascii_case(needle.as_bytes()))
        .unwrap_or(false)
}

/// Strip tags, scripts, styles, and common entities from HTML
fn strip_html_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len() / 2);
    let mut in_tag = false;
    let mut skip_until: Option<&str> = None;

    let mut i = 0;
    let bytes = html.as_bytes();

    while i < bytes.len() {
        if let Some(end_tag) = skip_until {
            if starts_with_ignore_case(html, i, end_tag) {
                i += end_tag.len();
                skip_until = None;
            } else {
                i += 1;
            }
            continue;
        }

        match bytes[i] {
            b'<' => {
                if starts_with_ignore_case(html, i, "<script") {
                    skip_until = Some("</script>");
                } else if starts_with_ignore_case(html, i, "<style") {
                    skip_until = Some("</style>");
                } else {
                    in_tag = true;
                    // Block-level closings become line breaks
                    if starts_with_ignore_case(html, i, "</p>")
                        || starts_with_ignore_case(html, i, "<br")
                    {
                        result.push('\n');
                    }
                }
                i += 1;
            }
            b'>' => {
                in_tag = false;
                i += 1;
            }
            b'&' if !in_tag => {
                let entities = [
                    ("&lt;", '<'),
                    ("&gt;", '>'),
                    ("&amp;", '&'),
                    ("&nbsp;", ' '),
                    ("&quot;", '"'),
                    ("&#39;", '\''),
                ];
                let mut matched = false;
                for (entity, ch) in entities {
                    if html[i..].starts_with(entity) {
                        result.push(ch);
                        i += entity.len();
                        matched = true;
                        break;
                    }
                }
                if !matched {
                    result.push('&');
                    i += 1;
                }
            }
            _ if !in_tag => {
                // Advance by whole characters, not bytes
                let ch = html[i..].chars().next().unwrap_or('\u{fffd}');
                result.push(ch);
                i += ch.len_utf8();
            }
            _ => {
                i += 1;
            }
        }
    }

    // Collapse runs of blank lines and surrounding whitespace
    result
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_url() {
        assert_eq!(
            classify_url("https://www.youtube.com/watch?v=abc"),
            SourceKind::Youtube
        );
        assert_eq!(classify_url("https://youtu.be/abc"), SourceKind::Youtube);
        assert_eq!(
            classify_url("https://example.com/article"),
            SourceKind::Url
        );
    }

    #[test]
    fn test_extract_title() {
        let html = "<html><head><title>Intro to Heat</title></head><body></body></html>";
        assert_eq!(extract_title(html), Some("Intro to Heat".to_string()));
        assert_eq!(extract_title("<html></html>"), None);
        assert_eq!(extract_title("<title>   </title>"), None);
    }

    #[test]
    fn test_strip_html_tags() {
        let html = "<p>Heat &amp; work</p><script>var x = 1;</script><p>Entropy</p>";
        let text = strip_html_tags(html);
        assert!(text.contains("Heat & work"));
        assert!(text.contains("Entropy"));
        assert!(!text.contains("var x"));
    }

    #[test]
    fn test_strip_html_preserves_unicode() {
        let html = "<p>température</p>";
        assert_eq!(strip_html_tags(html), "température");
    }

    #[test]
    fn test_extract_missing_file() {
        let err = extract_file_text(Path::new("/nonexistent/file.txt")).unwrap_err();
        assert!(matches!(err, FocusFlowError::Io(_)));
    }
}
