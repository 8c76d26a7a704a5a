//! OCR via the Tesseract command-line engine.
//!
//! The encoded page image is piped to `tesseract stdin stdout -l <lang>` and
//! the recognized text is read back from stdout.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use regassist_core::config::ExtractionConfig;
use regassist_core::error::AssistError;

use crate::OcrService;

/// Configuration for the Tesseract OCR service.
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Executable name or path.
    pub command: String,
    /// Tesseract language code(s), e.g. "eng".
    pub language: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            language: "eng".to_string(),
        }
    }
}

impl From<&ExtractionConfig> for TesseractConfig {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            command: config.tesseract_command.clone(),
            language: config.ocr_language.clone(),
        }
    }
}

/// OCR service backed by the `tesseract` executable.
pub struct TesseractOcrService {
    config: TesseractConfig,
}

impl TesseractOcrService {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }
}

impl OcrService for TesseractOcrService {
    async fn extract_text(&self, image_data: &[u8]) -> Result<String, AssistError> {
        if image_data.is_empty() {
            return Err(AssistError::Ocr("Empty image data".into()));
        }

        let mut child = Command::new(&self.config.command)
            .args(["stdin", "stdout", "-l", &self.config.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AssistError::Ocr(format!(
                    "Failed to start '{}': {}",
                    self.config.command, e
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AssistError::Ocr("tesseract stdin unavailable".into()))?;

        // Feed stdin concurrently so a full stdout pipe cannot stall the child.
        let data = image_data.to_vec();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&data).await;
            drop(stdin);
            result
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AssistError::Ocr(format!("tesseract did not complete: {}", e)))?;

        writer
            .await
            .map_err(|e| AssistError::Ocr(format!("OCR input task panicked: {}", e)))?
            .map_err(|e| AssistError::Ocr(format!("Failed to write image to tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AssistError::Ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(bytes = image_data.len(), chars = text.len(), "Page recognized");
        Ok(text)
    }
}
