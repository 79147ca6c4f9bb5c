//! Common types and utilities shared across the crate.

mod cancellation;
mod constants;
mod version;

pub use cancellation::CancellationToken;
pub use constants::*;
pub use version::VersionId;

use parking_lot::RwLock;
use std::sync::Arc;

/// Shared read-write cell used for lazily inspected state such as backtraces.
pub type Atomic<T> = Arc<RwLock<T>>;

/// Wraps a value in an [`Atomic`] cell.
pub fn atomic<T>(t: T) -> Atomic<T> {
    Arc::new(RwLock::new(t))
}
