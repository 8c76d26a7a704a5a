use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name used by chat providers ("user", "assistant").
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Capitalized label used in exported transcripts.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// Which logical conversation of a session an operation targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationId {
    /// The general assistant chat.
    #[default]
    General,
    /// The chat about the uploaded file set.
    Files,
}

/// The interchangeable LLM backends a file chat can be routed through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Hosted stateful assistant threads (run + poll).
    #[default]
    Assistant,
    /// Stateless chat-completion endpoint.
    Completion,
    /// Multimodal endpoint that receives the files themselves.
    Multimodal,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Assistant,
        BackendKind::Completion,
        BackendKind::Multimodal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Assistant => "assistant",
            BackendKind::Completion => "completion",
            BackendKind::Multimodal => "multimodal",
        }
    }

    /// Whether the backend consumes the extracted text instead of the raw files.
    pub fn needs_extracted_text(&self) -> bool {
        !matches!(self, BackendKind::Multimodal)
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document formats the extractor understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Office Open XML word-processor document (`.docx`).
    Docx,
    /// Portable Document Format, treated as scanned.
    Pdf,
}

pub const DOCX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

impl DocumentKind {
    /// Detect the kind from a declared media type, falling back to the
    /// filename extension. Returns `None` for anything else.
    pub fn detect(filename: &str, media_type: &str) -> Option<Self> {
        match media_type {
            PDF_MEDIA_TYPE => return Some(DocumentKind::Pdf),
            DOCX_MEDIA_TYPE => return Some(DocumentKind::Docx),
            _ => {}
        }
        Self::from_filename(filename)
    }

    /// Detect the kind from the filename extension alone.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            _ => None,
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            DocumentKind::Docx => DOCX_MEDIA_TYPE,
            DocumentKind::Pdf => PDF_MEDIA_TYPE,
        }
    }
}

// =============================================================================
// Conversation
// =============================================================================

/// A single turn in a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Append-only ordered transcript owned by one session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Render the transcript as `Role: content` lines in chronological order.
    pub fn export_transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Opaque identifier of a provider-side conversation thread.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadHandle(String);

impl ThreadHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Documents
// =============================================================================

/// A file listed by the document host. Never persisted locally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference {
    pub name: String,
    pub download_url: String,
}

/// One uploaded file, read fully into memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub content: Vec<u8>,
    pub media_type: String,
}

impl UploadedFile {
    pub fn new(
        filename: impl Into<String>,
        content: Vec<u8>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content,
            media_type: media_type.into(),
        }
    }

    pub fn kind(&self) -> Option<DocumentKind> {
        DocumentKind::detect(&self.filename, &self.media_type)
    }
}

/// Ordered set of uploaded files. Identity is the ordered filename list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFileSet {
    pub id: Uuid,
    pub files: Vec<UploadedFile>,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadedFileSet {
    pub fn new(files: Vec<UploadedFile>) -> Self {
        Self {
            id: Uuid::new_v4(),
            files,
            uploaded_at: Utc::now(),
        }
    }

    pub fn filenames(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.filename.as_str()).collect()
    }

    /// True when `other` names exactly the same files in the same order.
    pub fn same_filenames(&self, other: &[UploadedFile]) -> bool {
        self.files.len() == other.len()
            && self
                .files
                .iter()
                .zip(other)
                .all(|(a, b)| a.filename == b.filename)
    }

    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|f| f.content.len()).sum()
    }
}

/// Plain text derived from an uploaded file set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    /// The file set this text was derived from.
    pub source_set: Uuid,
    pub text: String,
}

impl ExtractedText {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
