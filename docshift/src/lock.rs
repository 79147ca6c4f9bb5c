//! Storage-backed mutual exclusion for migration runs.
//!
//! Concurrency in this system comes from independent processes racing to
//! migrate the same database. The lock is a single marker document in a
//! dedicated collection; acquiring it is one insert guarded by a uniqueness
//! constraint, so the storage layer - not a check-then-act sequence - decides
//! which process wins.

use crate::common::{FIELD_ID, FIELD_LOCK_ACQUIRED_AT, FIELD_LOCK_OWNER, LOCK_MARKER_ID};
use crate::errors::{DocshiftResult, ErrorKind};
use crate::store::{Document, DocumentCollection, ExecutionContext, Filter};
use chrono::Utc;
use uuid::Uuid;

/// Distributed lock over a dedicated lock collection.
///
/// At most one live lock record exists per database. A record outliving its
/// run signals a concurrent (or crashed) migration attempt.
#[derive(Clone, Debug)]
pub struct DistributedLock {
    collection: DocumentCollection,
    owner: String,
}

impl DistributedLock {
    /// Creates a lock handle with a fresh owner id.
    pub fn new(collection: DocumentCollection) -> Self {
        DistributedLock {
            collection,
            owner: Uuid::new_v4().to_string(),
        }
    }

    /// The owner id written into the lock record by this handle.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Attempts to create the lock record.
    ///
    /// Succeeds iff no live record exists. The insert itself is the atomic
    /// acquire: a `UniqueConstraintViolation` from the storage layer means
    /// another process already holds the lock and maps to `Ok(false)`; every
    /// other error propagates.
    pub fn try_acquire(&self) -> DocshiftResult<bool> {
        self.collection.ensure_unique_index(&[FIELD_ID])?;

        let mut record = Document::new();
        record.put(FIELD_ID, LOCK_MARKER_ID)?;
        record.put(FIELD_LOCK_OWNER, self.owner.as_str())?;
        record.put(FIELD_LOCK_ACQUIRED_AT, Utc::now())?;

        match self
            .collection
            .insert_one(record, &ExecutionContext::NoTransaction)
        {
            Ok(()) => {
                log::debug!("Acquired migration lock as owner {}", self.owner);
                Ok(true)
            }
            Err(e) if e.kind() == &ErrorKind::UniqueConstraintViolation => {
                log::info!("Migration lock is held by another process");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Removes the lock record unconditionally.
    ///
    /// The local process is assumed to be the sole legitimate holder once it
    /// has acquired; releasing an already-released lock is a no-op.
    pub fn release(&self) -> DocshiftResult<()> {
        self.collection.delete_matching(
            &Filter::by(FIELD_ID, LOCK_MARKER_ID),
            &ExecutionContext::NoTransaction,
        )?;
        log::debug!("Released migration lock held by owner {}", self.owner);
        Ok(())
    }

    /// Checks whether a live lock record exists.
    pub fn is_held(&self) -> DocshiftResult<bool> {
        Ok(self
            .collection
            .find_all()?
            .iter()
            .any(|doc| doc.get(FIELD_ID).and_then(|v| v.as_text()) == Some(LOCK_MARKER_ID)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryClient;
    use crate::store::{Database, StoreClientProvider};
    use std::sync::Arc;
    use std::thread;

    fn lock_collection() -> (Database, DocumentCollection) {
        let db = InMemoryClient::new().database("testdb").unwrap();
        let coll = db.collection("_migrations.lock").unwrap();
        (db, coll)
    }

    #[test]
    fn test_acquire_and_release() {
        let (_db, coll) = lock_collection();
        let lock = DistributedLock::new(coll);

        assert!(lock.try_acquire().unwrap());
        assert!(lock.is_held().unwrap());

        lock.release().unwrap();
        assert!(!lock.is_held().unwrap());
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let (_db, coll) = lock_collection();
        let first = DistributedLock::new(coll.clone());
        let second = DistributedLock::new(coll);

        assert!(first.try_acquire().unwrap());
        assert!(!second.try_acquire().unwrap());

        first.release().unwrap();
        assert!(second.try_acquire().unwrap());
    }

    #[test]
    fn test_release_is_unconditional_and_idempotent() {
        let (_db, coll) = lock_collection();
        let lock = DistributedLock::new(coll);

        lock.release().unwrap();
        assert!(lock.try_acquire().unwrap());
        lock.release().unwrap();
        lock.release().unwrap();
    }

    #[test]
    fn test_owners_are_distinct() {
        let (_db, coll) = lock_collection();
        let a = DistributedLock::new(coll.clone());
        let b = DistributedLock::new(coll);
        assert_ne!(a.owner(), b.owner());
    }

    #[test]
    fn test_exactly_one_of_racing_acquires_wins() {
        let (_db, coll) = lock_collection();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let lock = DistributedLock::new(coll.clone());
                thread::spawn(move || lock.try_acquire().unwrap())
            })
            .collect();

        let wins: usize = threads
            .into_iter()
            .map(|t| t.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_acquire_across_threads_with_shared_collection() {
        let (_db, coll) = lock_collection();
        let coll = Arc::new(coll);

        let lock = DistributedLock::new((*coll).clone());
        assert!(lock.try_acquire().unwrap());

        let remote_coll = (*coll).clone();
        let handle = thread::spawn(move || {
            let other = DistributedLock::new(remote_coll);
            other.try_acquire().unwrap()
        });
        assert!(!handle.join().unwrap());
    }
}
