//! Wire and domain types for the Backboard assistant API.
//!
//! JSON payloads are consumed permissively: unknown fields are ignored and
//! optional fields default to absent, so shape drift upstream never breaks
//! deserialization.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Indexed,
    Failed,
}

impl DocumentStatus {
    /// Indexed and failed are terminal; pending and processing are polled.
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Indexed | DocumentStatus::Failed)
    }
}

/// A document attached to a message, tracked through server-side indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub document_id: String,
    pub filename: String,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

/// A retrieved-memory citation attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub memory_id: String,
    pub content: String,
    pub created_at: String,
}

/// A retrieved-file citation attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedFile {
    pub document_id: String,
    pub filename: String,
    pub chunk_content: String,
    pub relevance_score: f64,
}

/// A single message in a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub thread_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retrieved_memories: Vec<Memory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retrieved_files: Vec<RetrievedFile>,
    pub created_at: String,
}

impl ChatMessage {
    /// A new message timestamped now, with a caller-chosen id.
    pub fn new(
        message_id: impl Into<String>,
        thread_id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            thread_id: thread_id.into(),
            role,
            content: content.into(),
            attachments: Vec::new(),
            retrieved_memories: Vec::new(),
            retrieved_files: Vec::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub thread_id: String,
    pub assistant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    pub assistant_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub created_at: String,
}

/// Whether the assistant reads/writes long-term memory for a turn.
/// Serialized lowercase on the wire (`off`, `readonly`, `auto`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMode {
    Off,
    Readonly,
    Auto,
}

impl MemoryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryMode::Off => "off",
            MemoryMode::Readonly => "readonly",
            MemoryMode::Auto => "auto",
        }
    }
}

impl Default for MemoryMode {
    fn default() -> Self {
        MemoryMode::Auto
    }
}

/// Provider + model pair a turn is routed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub llm_provider: String,
    pub model_name: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            llm_provider: "openai".to_string(),
            model_name: "gpt-4o".to_string(),
        }
    }
}

/// Complete (non-streaming) reply to a send-message request.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub retrieved_memories: Vec<Memory>,
    #[serde(default)]
    pub retrieved_files: Vec<RetrievedFile>,
}

/// Reply from the per-document status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentStatusResponse {
    pub document_id: String,
    pub status: DocumentStatus,
    #[serde(default)]
    pub status_message: Option<String>,
}
