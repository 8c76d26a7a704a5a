use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AssistError, Result};

/// Top-level configuration for the Regulatory Assistant.
///
/// Loaded from `~/.regassist/config.toml` by default. Secrets may be left
/// out of the file and supplied through environment variables instead; see
/// [`AssistConfig::apply_env_overrides`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub multimodal: MultimodalConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// Environment variables that override secrets from the config file.
pub const ENV_PASSWORD: &str = "REGASSIST_PASSWORD";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ASSISTANT_ID: &str = "ASSISTANT_ID";
pub const ENV_COMPLETION_API_KEY: &str = "COMPLETION_API_KEY";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";

impl AssistConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AssistConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file if it exists.
    ///
    /// A missing file is `Ok(None)`; an unreadable or malformed one is an
    /// error rather than a silent fallback.
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AssistError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Overlay secrets from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Overlay secrets from an arbitrary lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_PASSWORD) {
            self.auth.password = v;
        }
        if let Some(v) = get(ENV_OPENAI_API_KEY) {
            self.assistant.api_key = v;
        }
        if let Some(v) = get(ENV_ASSISTANT_ID) {
            self.assistant.assistant_id = v;
        }
        if let Some(v) = get(ENV_COMPLETION_API_KEY) {
            self.completion.api_key = v;
        }
        if let Some(v) = get(ENV_GEMINI_API_KEY) {
            self.multimodal.api_key = v;
        }
        if let Some(v) = get(ENV_GITHUB_TOKEN) {
            self.directory.token = v;
        }
    }

    /// Reject configurations the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.auth.password.is_empty() {
            return Err(AssistError::Config(format!(
                "auth.password is empty; set it in the config file or via {}",
                ENV_PASSWORD
            )));
        }
        if self.assistant.poll_interval_ms == 0 {
            return Err(AssistError::Config(
                "assistant.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.assistant.max_poll_attempts == 0 {
            return Err(AssistError::Config(
                "assistant.max_poll_attempts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Title shown by clients.
    pub title: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Disclaimer shown next to every conversation.
    pub disclaimer: String,
    /// Usage instructions shown to users.
    pub instructions: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            title: "Regulatory Assistant".to_string(),
            log_level: "info".to_string(),
            disclaimer: "Regulatory Assistant can make mistakes. Verify important information."
                .to_string(),
            instructions: vec![
                "Clearly enter your queries.".to_string(),
                "Use \"Clear Chat\" to reset the conversation.".to_string(),
                "Export chat history if required.".to_string(),
            ],
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// API server port.
    pub port: u16,
    /// Maximum accepted upload body in bytes.
    pub max_upload_bytes: usize,
    /// Requests per second allowed per session on protected routes.
    pub rate_limit_per_sec: u64,
    /// Extra origins allowed by CORS, in addition to localhost on `port`.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            max_upload_bytes: 25 * 1024 * 1024,
            rate_limit_per_sec: 50,
            allowed_origins: Vec::new(),
        }
    }
}

/// Password gate and session lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared password for the user group.
    pub password: String,
    /// Idle minutes after which a session is discarded.
    pub session_timeout_minutes: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password: String::new(),
            session_timeout_minutes: 480,
        }
    }
}

/// Hosted assistant (thread + run) provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub base_url: String,
    pub api_key: String,
    pub assistant_id: String,
    /// Fixed delay between run status checks.
    pub poll_interval_ms: u64,
    /// Status checks before the run is abandoned.
    pub max_poll_attempts: u32,
    pub request_timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            assistant_id: String::new(),
            poll_interval_ms: 1000,
            max_poll_attempts: 300,
            request_timeout_secs: 60,
        }
    }
}

impl AssistantConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.assistant_id.is_empty()
    }
}

/// Stateless chat-completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Full URL of the chat-completions endpoint.
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepseek.com/chat/completions".to_string(),
            api_key: String::new(),
            model: "deepseek-chat".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl CompletionConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.endpoint.is_empty()
    }
}

/// Multimodal file-aware chat provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultimodalConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

impl Default for MultimodalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            request_timeout_secs: 180,
        }
    }
}

impl MultimodalConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Remote reference-document repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Repository-contents URL returning a JSON array of `{name, download_url}`.
    pub contents_url: String,
    pub token: String,
    /// Sent on every request; the GitHub API rejects requests without one.
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            contents_url: "https://api.github.com/repos/mgharaibehAE/assistant/contents/docs"
                .to_string(),
            token: String::new(),
            user_agent: "regassist".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Document extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Path or name of the Tesseract executable.
    pub tesseract_command: String,
    /// Tesseract language code(s), e.g. "eng" or "eng+fra".
    pub ocr_language: String,
    /// Target width in pixels when rasterising PDF pages.
    pub render_width: u16,
    /// Directory holding the pdfium shared library. Empty means system lookup.
    pub pdfium_library_dir: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            tesseract_command: "tesseract".to_string(),
            ocr_language: "eng".to_string(),
            render_width: 2000,
            pdfium_library_dir: String::new(),
        }
    }
}
