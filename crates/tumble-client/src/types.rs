use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tumble_protocol::{ConfidenceTier, Source};

/// Body of the outbound request that starts one streaming turn.
///
/// `session_id` is serialized as an explicit `null` on a conversation's
/// first turn; the backend assigns a session and echoes it back in the
/// metadata event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatStreamRequest {
    pub message: String,
    pub session_id: Option<String>,
}

/// Conversation record as returned by the sessions endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One stored message inside a session detail response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMessageRecord {
    pub id: String,
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub confidence_tier: Option<ConfidenceTier>,
    #[serde(default)]
    pub sources: Option<Vec<Source>>,
    pub created_at: DateTime<Utc>,
}

/// Session record with its full message history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: SessionRecord,
    #[serde(default)]
    pub messages: Vec<SessionMessageRecord>,
}

/// Rating submission for one assistant message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackRequest {
    pub message_id: String,
    pub rating: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
/// Ingestion lifecycle state of a knowledge-base document.
pub enum DocumentStatus {
    Pending,
    Processing,
    Ready,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
/// Accepted source kinds for document ingestion.
pub enum DocumentSourceType {
    Markdown,
    Pdf,
    Web,
    Docx,
}

/// Knowledge-base document record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub source_type: DocumentSourceType,
    pub source_uri: String,
    pub status: DocumentStatus,
    pub chunk_count: u64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to register a document for ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentCreateRequest {
    pub title: String,
    pub source_type: DocumentSourceType,
    pub source_uri: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Point-in-time ingestion progress for one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionStatus {
    pub document_id: String,
    pub status: DocumentStatus,
    pub chunk_count: u64,
    #[serde(default)]
    pub error_message: Option<String>,
}
