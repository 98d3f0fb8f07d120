use async_trait::async_trait;

use crate::error::ClientError;
use crate::types::ChatStreamRequest;

/// One in-flight streaming response body, read chunk by chunk.
///
/// Chunk boundaries carry no meaning; the decoder on the consuming side
/// reassembles lines and events from whatever arrives.
#[async_trait]
pub trait StreamHandle: Send {
    /// Returns the next raw chunk, or `None` at end-of-stream.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ClientError>;
}

impl std::fmt::Debug for dyn StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StreamHandle")
    }
}

/// Capability to open one streaming chat turn.
///
/// The turn controller is written against this seam so tests can drive it
/// with synthetic byte feeds instead of a live backend.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open_turn(
        &self,
        request: &ChatStreamRequest,
    ) -> Result<Box<dyn StreamHandle>, ClientError>;
}
