use thiserror::Error;

/// Top-level error type for the Regulatory Assistant.
///
/// Subsystem crates either return this type directly or define their own
/// error enum with a `From<AssistError>` conversion so that `?` works across
/// crate boundaries. None of these errors are retried internally; they are
/// surfaced to the user in place of the expected output.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssistError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Incorrect password")]
    AuthFailed,

    #[error("Assistant failed to respond (run status: {status}). Please retry.")]
    RemoteJobFailed { status: String },

    #[error("Assistant did not finish after {attempts} status checks. Please retry.")]
    RemoteJobTimedOut { attempts: u32 },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Remote call failed: {0}")]
    RemoteCallFailed(String),

    #[error("Failed to load documents. Error: {status}, {message}")]
    DirectoryUnavailable { status: u16, message: String },

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Unsupported document: {0}")]
    UnsupportedDocument(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for AssistError {
    fn from(err: toml::de::Error) -> Self {
        AssistError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AssistError {
    fn from(err: toml::ser::Error) -> Self {
        AssistError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AssistError {
    fn from(err: serde_json::Error) -> Self {
        AssistError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Regulatory Assistant operations.
pub type Result<T> = std::result::Result<T, AssistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AssistError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_directory_unavailable_carries_status_and_message() {
        let err = AssistError::DirectoryUnavailable {
            status: 404,
            message: "Not Found".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("404"));
        assert!(display.contains("Not Found"));
    }

    #[test]
    fn test_remote_job_failed_names_status() {
        let err = AssistError::RemoteJobFailed {
            status: "failed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Assistant failed to respond (run status: failed). Please retry."
        );
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(AssistError, &str)> = vec![
            (AssistError::AuthFailed, "Incorrect password"),
            (AssistError::Cancelled, "Request cancelled"),
            (
                AssistError::RemoteCallFailed("HTTP 500".to_string()),
                "Remote call failed: HTTP 500",
            ),
            (
                AssistError::RemoteJobTimedOut { attempts: 3 },
                "Assistant did not finish after 3 status checks. Please retry.",
            ),
            (
                AssistError::Extraction("corrupt zip".to_string()),
                "Extraction error: corrupt zip",
            ),
            (
                AssistError::Ocr("tesseract missing".to_string()),
                "OCR error: tesseract missing",
            ),
            (
                AssistError::UnsupportedDocument("notes.txt".to_string()),
                "Unsupported document: notes.txt",
            ),
            (
                AssistError::BackendUnavailable("multimodal".to_string()),
                "Backend unavailable: multimodal",
            ),
            (
                AssistError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AssistError = io_err.into();
        assert!(matches!(err, AssistError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let converted: AssistError = err.unwrap_err().into();
        assert!(matches!(converted, AssistError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let converted: AssistError = err.unwrap_err().into();
        assert!(matches!(converted, AssistError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }
}
