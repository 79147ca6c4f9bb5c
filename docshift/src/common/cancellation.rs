use crate::errors::{DocshiftError, DocshiftResult, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation signal for long-running migration runs.
///
/// The token is checked at every storage boundary (lock acquisition, before
/// each migration unit). Cancellation never rolls back work that has already
/// committed; it only prevents new work from starting.
///
/// Clones share the same underlying flag, so a token handed to a migration
/// run can be cancelled from another thread.
///
/// # Usage
/// ```ignore
/// let token = CancellationToken::new();
/// let worker = token.clone();
/// // elsewhere:
/// token.cancel();
/// assert!(worker.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a new, non-cancelled token.
    pub fn new() -> Self {
        CancellationToken {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Requests cancellation. Idempotent; a token can never be un-cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Checks whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns an error with kind `Cancelled` if cancellation was requested.
    ///
    /// Called at suspension points so a cancelled run stops before starting
    /// the next storage operation.
    pub fn checkpoint(&self) -> DocshiftResult<()> {
        if self.is_cancelled() {
            return Err(DocshiftError::new(
                "Migration run was cancelled",
                ErrorKind::Cancelled,
            ));
        }
        Ok(())
    }
}
