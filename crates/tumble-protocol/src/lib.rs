//! Wire types and incremental decoder for the Tumble chat event stream.
mod decoder;
mod types;

pub use decoder::StreamDecoder;
pub use types::{ConfidenceTier, ProtocolEvent, Source, TurnMetadata, TurnUsage};
