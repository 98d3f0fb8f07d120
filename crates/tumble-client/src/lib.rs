//! HTTP client surface for the Tumble backend API.
mod api;
mod error;
mod transport;
mod types;

pub use api::{ApiClient, ApiClientConfig};
pub use error::ClientError;
pub use transport::{ChatTransport, StreamHandle};
pub use types::{
    ChatStreamRequest, DocumentCreateRequest, DocumentRecord, DocumentSourceType, DocumentStatus,
    FeedbackRequest, IngestionStatus, SessionDetail, SessionMessageRecord, SessionRecord,
};
