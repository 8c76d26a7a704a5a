//! PDF page rasterisation.
//!
//! Every PDF is treated as scanned: pages are rendered to PNG images and the
//! text comes from OCR, never from the PDF text layer. pdfium is not
//! async-safe, so callers run [`PageRenderer::render_pages`] on a blocking
//! thread.

use std::io::Cursor;
use std::path::PathBuf;

use image::ImageFormat;
use pdfium_render::prelude::*;
use tracing::debug;

use regassist_core::config::ExtractionConfig;
use regassist_core::error::{AssistError, Result};

/// Renders each page of a PDF to an encoded image, in page order.
pub trait PageRenderer: Send + Sync {
    fn render_pages(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>>;
}

/// Page renderer backed by the pdfium library.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    library_dir: Option<PathBuf>,
    target_width: u16,
}

impl PdfiumRenderer {
    pub fn new(library_dir: Option<PathBuf>, target_width: u16) -> Self {
        Self {
            library_dir,
            target_width,
        }
    }

    fn bind(&self) -> Result<Pdfium> {
        let bindings = match &self.library_dir {
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| AssistError::Extraction(format!("pdfium library unavailable: {}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl From<&ExtractionConfig> for PdfiumRenderer {
    fn from(config: &ExtractionConfig) -> Self {
        let library_dir = if config.pdfium_library_dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(&config.pdfium_library_dir))
        };
        Self::new(library_dir, config.render_width)
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render_pages(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| AssistError::Extraction(format!("Unreadable PDF: {}", e)))?;

        let render_config = PdfRenderConfig::new().set_target_width(self.target_width as i32);

        let mut pages = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            let image = page
                .render_with_config(&render_config)
                .map_err(|e| {
                    AssistError::Extraction(format!("Failed to render page {}: {}", index + 1, e))
                })?
                .as_image();

            let mut png = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(|e| {
                    AssistError::Extraction(format!("Failed to encode page {}: {}", index + 1, e))
                })?;
            debug!(page = index + 1, bytes = png.len(), "PDF page rendered");
            pages.push(png);
        }

        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_empty_dir_uses_system_library() {
        let renderer = PdfiumRenderer::from(&ExtractionConfig::default());
        assert!(renderer.library_dir.is_none());
        assert_eq!(renderer.target_width, 2000);
    }

    #[test]
    fn test_from_config_with_dir() {
        let config = ExtractionConfig {
            pdfium_library_dir: "/opt/pdfium/lib".to_string(),
            render_width: 1200,
            ..ExtractionConfig::default()
        };
        let renderer = PdfiumRenderer::from(&config);
        assert_eq!(renderer.library_dir, Some(PathBuf::from("/opt/pdfium/lib")));
        assert_eq!(renderer.target_width, 1200);
    }
}
