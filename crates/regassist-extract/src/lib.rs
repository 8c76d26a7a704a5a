//! Document extraction: converts uploaded or fetched files into plain text.
//!
//! DOCX files yield their paragraphs; PDFs are rasterised page by page and
//! run through OCR. Empty content extracts to an empty string. Files that
//! cannot be parsed at all are reported as errors rather than silently
//! becoming empty context.

pub mod docx;
pub mod pdf;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use regassist_core::error::{AssistError, Result};
use regassist_core::types::{DocumentKind, ExtractedText, UploadedFile, UploadedFileSet};
use regassist_ocr::OcrService;

pub use docx::{docx_paragraphs, extract_docx};
pub use pdf::{PageRenderer, PdfiumRenderer};

/// Object-safe extraction interface used by the chat and API layers.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract plain text from raw document bytes of a known kind.
    async fn extract_bytes(&self, kind: DocumentKind, name: &str, bytes: &[u8]) -> Result<String>;

    /// Extract plain text from one uploaded file.
    async fn extract(&self, file: &UploadedFile) -> Result<String> {
        let kind = file
            .kind()
            .ok_or_else(|| AssistError::UnsupportedDocument(file.filename.clone()))?;
        self.extract_bytes(kind, &file.filename, &file.content).await
    }

    /// Extract and concatenate every file of a set, in upload order.
    async fn extract_set(&self, set: &UploadedFileSet) -> Result<ExtractedText> {
        let mut texts = Vec::with_capacity(set.files.len());
        for file in &set.files {
            texts.push(self.extract(file).await?);
        }
        Ok(ExtractedText {
            source_set: set.id,
            text: texts.join("\n"),
        })
    }
}

/// Extractor combining DOCX parsing with render-then-OCR for PDFs.
pub struct DocumentExtractor<O: OcrService> {
    ocr: O,
    renderer: Arc<dyn PageRenderer>,
}

impl<O: OcrService> DocumentExtractor<O> {
    pub fn new(ocr: O, renderer: Arc<dyn PageRenderer>) -> Self {
        Self { ocr, renderer }
    }

    async fn extract_pdf(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let renderer = Arc::clone(&self.renderer);
        let data = bytes.to_vec();
        let pages = tokio::task::spawn_blocking(move || renderer.render_pages(&data))
            .await
            .map_err(|e| AssistError::Extraction(format!("PDF render task panicked: {}", e)))??;

        debug!(file = %name, pages = pages.len(), "Running OCR on PDF pages");

        let mut texts = Vec::with_capacity(pages.len());
        for page in &pages {
            let text = self.ocr.extract_text(page).await?;
            texts.push(text.trim_end().to_string());
        }
        Ok(texts.join("\n"))
    }
}

#[async_trait]
impl<O: OcrService> TextExtractor for DocumentExtractor<O> {
    async fn extract_bytes(&self, kind: DocumentKind, name: &str, bytes: &[u8]) -> Result<String> {
        if bytes.is_empty() {
            warn!(file = %name, "Empty document, nothing to extract");
            return Ok(String::new());
        }

        let text = match kind {
            DocumentKind::Docx => extract_docx(bytes)?,
            DocumentKind::Pdf => self.extract_pdf(name, bytes).await?,
        };

        if text.trim().is_empty() {
            warn!(file = %name, kind = ?kind, "Document produced no text");
        } else {
            debug!(file = %name, kind = ?kind, chars = text.len(), "Document extracted");
        }
        Ok(text)
    }
}
