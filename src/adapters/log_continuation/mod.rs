// Log continuation adapter - Reports re-invocation requests through tracing

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::ports::ContinuationSignal;

/// Continuation signal for hosts that drive chunks themselves
///
/// Every request is logged and counted.
#[derive(Debug, Default)]
pub struct LoggingContinuation {
    requests: AtomicU64,
}

impl LoggingContinuation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunk requests seen so far
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

impl ContinuationSignal for LoggingContinuation {
    fn request_next_chunk(&self, session_id: &str) {
        let count = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        info!(session_id, request = count, "Waiting for next chunk");
    }
}
