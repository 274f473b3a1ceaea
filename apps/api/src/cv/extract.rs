//! PDF text extraction.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

/// The PDF header may be preceded by junk; readers accept it within the first 1 KiB.
const HEADER_SEARCH_WINDOW: usize = 1024;
const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("document is not a PDF")]
    NotPdf,

    #[error("document is encrypted")]
    Encrypted,

    #[error("unreadable PDF: {0}")]
    Unreadable(String),

    #[error("document contains no extractable text")]
    NoText,

    #[error("PDF parser aborted: {0}")]
    Aborted(String),
}

/// Turns an uploaded document into its concatenated page text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, document: Bytes) -> Result<String, ExtractError>;
}

/// Returns true if `bytes` carries a `%PDF-` header near the start.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}

/// `pdf-extract` backed extractor. Parsing is CPU-bound and runs on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, document: Bytes) -> Result<String, ExtractError> {
        if !looks_like_pdf(&document) {
            return Err(ExtractError::NotPdf);
        }

        let parsed =
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&document))
                .await
                // The parser panics on some malformed inputs; surface that as a bad document.
                .map_err(|e| ExtractError::Aborted(e.to_string()))?;

        let text = parsed.map_err(|e| classify_parse_error(e.to_string()))?;
        debug!("Extracted {} characters of text from PDF", text.len());

        if text.trim().is_empty() {
            return Err(ExtractError::NoText);
        }
        Ok(text)
    }
}

fn classify_parse_error(message: String) -> ExtractError {
    if message.to_lowercase().contains("encrypt") {
        ExtractError::Encrypted
    } else {
        ExtractError::Unreadable(message)
    }
}
