use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, write-once cooperative cancellation signal.
///
/// One token is shared between a caller and the single operation it controls
/// (one chat turn, or one probe run). The running operation observes it at
/// defined suspension points only; cancellation is never preemptive.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
