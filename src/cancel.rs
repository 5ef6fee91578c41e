//! Cooperative cancellation for long-running walks and archive jobs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared cancel flag.
///
/// Clones observe the same flag. The history walker checks it once per
/// commit; the compression pipe checks it while waiting on the compressor
/// and kills the child when it flips.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
