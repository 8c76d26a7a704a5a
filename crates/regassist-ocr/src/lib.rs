//! Page OCR for scanned PDFs.
//!
//! [`OcrService`] turns one rendered page image into text. The production
//! engine is [`TesseractOcrService`]; [`MockOcrService`] answers with fixed
//! text and counts the pages it was shown.

pub mod tesseract;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use regassist_core::error::AssistError;

pub use tesseract::{TesseractConfig, TesseractOcrService};

/// Text recognition over a single encoded page image (PNG).
///
/// A page with no recognisable text yields an empty string, not an error.
pub trait OcrService: Send + Sync {
    fn extract_text(
        &self,
        image_data: &[u8],
    ) -> impl std::future::Future<Output = Result<String, AssistError>> + Send;
}

/// Fixed-answer OCR engine for tests.
#[derive(Debug, Clone, Default)]
pub struct MockOcrService {
    page_text: String,
    pages_seen: Arc<AtomicUsize>,
}

impl MockOcrService {
    /// Answers every page with a generic placeholder line.
    pub fn new() -> Self {
        Self::with_text("Scanned page text")
    }

    pub fn with_text(text: &str) -> Self {
        Self {
            page_text: text.to_string(),
            pages_seen: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Blank pages.
    pub fn empty() -> Self {
        Self::with_text("")
    }

    /// Pages recognised so far, shared between clones.
    pub fn pages_seen(&self) -> usize {
        self.pages_seen.load(Ordering::SeqCst)
    }
}

impl OcrService for MockOcrService {
    async fn extract_text(&self, image_data: &[u8]) -> Result<String, AssistError> {
        if image_data.is_empty() {
            return Err(AssistError::Ocr("page image is empty".to_string()));
        }
        self.pages_seen.fetch_add(1, Ordering::SeqCst);
        Ok(self.page_text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_text_per_page() {
        let service = MockOcrService::with_text("Docket No. U-12345");
        assert_eq!(service.extract_text(&[1]).await.unwrap(), "Docket No. U-12345");
        assert_eq!(service.extract_text(&[2]).await.unwrap(), "Docket No. U-12345");
        assert_eq!(service.pages_seen(), 2);
    }

    #[tokio::test]
    async fn test_counter_shared_between_clones() {
        let service = MockOcrService::new();
        let clone = service.clone();
        clone.extract_text(&[1]).await.unwrap();
        assert_eq!(service.pages_seen(), 1);
    }

    #[tokio::test]
    async fn test_blank_page() {
        let text = MockOcrService::empty().extract_text(&[1]).await.unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_empty_image_rejected() {
        let service = MockOcrService::new();
        let result = service.extract_text(&[]).await;
        assert!(matches!(result, Err(AssistError::Ocr(_))));
        assert_eq!(service.pages_seen(), 0);
    }
}
