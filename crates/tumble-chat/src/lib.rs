//! Streaming turn controller and single-conversation chat session.
mod cancel;
mod session;
mod turn;

pub use cancel::CancelToken;
pub use session::{ChatMessage, ChatSession, MessageArena, MessageRole, SendOutcome};
pub use turn::{run_turn, TurnOutcome, TurnState, CONNECT_FAILURE_DETAIL};

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static MESSAGE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Locally unique id for messages created on this side of the wire. The
/// backend reassigns assistant message ids via the metadata event.
pub fn new_message_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let count = MESSAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("local-{millis}-{count}")
}
