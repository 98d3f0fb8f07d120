use thiserror::Error;

/// Failures surfaced by the API client and the streaming transport.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
}
