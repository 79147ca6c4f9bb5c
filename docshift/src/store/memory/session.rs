use crate::errors::{DocshiftError, DocshiftResult, ErrorKind};
use crate::store::memory::collection::InMemoryCollection;
use crate::store::{Document, Filter, SessionOptions, SessionProvider};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use uuid::Uuid;

/// A write operation staged by a collection into its session.
pub(crate) enum StagedOp {
    Insert {
        collection: InMemoryCollection,
        document: Document,
    },
    Delete {
        collection: InMemoryCollection,
        filter: Filter,
    },
}

/// Compensation for one committed operation, replayed in reverse when a
/// later operation in the same commit fails.
enum UndoEntry {
    RemoveInserted {
        collection: InMemoryCollection,
        id: String,
    },
    RestoreRemoved {
        collection: InMemoryCollection,
        documents: Vec<Document>,
    },
}

impl UndoEntry {
    fn revert(self) {
        match self {
            UndoEntry::RemoveInserted { collection, id } => {
                collection.remove_by_id_direct(&id);
            }
            UndoEntry::RestoreRemoved {
                collection,
                documents,
            } => {
                collection.restore_direct(documents);
            }
        }
    }
}

enum TxState {
    Active(Vec<StagedOp>),
    Committed,
    Aborted,
}

/// In-memory session holding one transaction.
///
/// Writes issued under this session are staged, not applied. `commit`
/// serializes against other commits on the same database and applies the
/// write set in order, keeping undo entries so a rejected operation (a
/// unique-index violation, say) rolls the whole set back. `abort` discards
/// the set. Both are terminal.
///
/// Reads are not routed through the session: visibility is read-committed.
#[derive(Clone)]
pub struct InMemorySession {
    inner: Arc<InMemorySessionInner>,
}

impl InMemorySession {
    pub(crate) fn new(options: &SessionOptions, commit_lock: Arc<Mutex<()>>) -> Self {
        let id = Uuid::new_v4().to_string();
        log::debug!(
            "Began session {}{}",
            id,
            options
                .label()
                .map(|l| format!(" ({})", l))
                .unwrap_or_default()
        );
        InMemorySession {
            inner: Arc::new(InMemorySessionInner {
                id,
                label: options.label().map(|l| l.to_string()),
                state: Mutex::new(TxState::Active(Vec::new())),
                commit_lock,
            }),
        }
    }

    pub(crate) fn stage(&self, op: StagedOp) -> DocshiftResult<()> {
        let mut state = self.inner.state.lock();
        match &mut *state {
            TxState::Active(staged) => {
                staged.push(op);
                Ok(())
            }
            _ => Err(DocshiftError::new(
                &format!("Session {} is no longer active", self.inner.id),
                ErrorKind::TransactionError,
            )),
        }
    }
}

impl SessionProvider for InMemorySession {
    fn id(&self) -> String {
        self.inner.id.clone()
    }

    fn is_active(&self) -> bool {
        matches!(&*self.inner.state.lock(), TxState::Active(_))
    }

    fn commit(&self) -> DocshiftResult<()> {
        let mut state = self.inner.state.lock();
        let staged = match &mut *state {
            TxState::Active(staged) => std::mem::take(staged),
            _ => {
                return Err(DocshiftError::new(
                    &format!("Session {} was already committed or aborted", self.inner.id),
                    ErrorKind::TransactionError,
                ));
            }
        };

        // one commit at a time per database
        let _commit_guard = self.inner.commit_lock.lock();

        let mut undo: Vec<UndoEntry> = Vec::with_capacity(staged.len());
        for op in staged {
            let outcome = match op {
                StagedOp::Insert {
                    collection,
                    document,
                } => collection
                    .insert_direct(document)
                    .map(|id| UndoEntry::RemoveInserted { collection, id }),
                StagedOp::Delete { collection, filter } => collection
                    .remove_direct(&filter)
                    .map(|documents| UndoEntry::RestoreRemoved {
                        collection,
                        documents,
                    }),
            };

            match outcome {
                Ok(entry) => undo.push(entry),
                Err(e) => {
                    for entry in undo.into_iter().rev() {
                        entry.revert();
                    }
                    *state = TxState::Aborted;
                    log::error!(
                        "Commit of session {} failed, rolled back: {}",
                        self.inner.id,
                        e
                    );
                    return Err(DocshiftError::new_with_cause(
                        &format!("Commit of session {} failed; staged operations rolled back", self.inner.id),
                        ErrorKind::TransactionError,
                        e,
                    ));
                }
            }
        }

        *state = TxState::Committed;
        log::debug!("Committed session {}", self.inner.id);
        Ok(())
    }

    fn abort(&self) -> DocshiftResult<()> {
        let mut state = self.inner.state.lock();
        match &*state {
            TxState::Active(_) => {
                *state = TxState::Aborted;
                log::debug!("Aborted session {}", self.inner.id);
                Ok(())
            }
            _ => Err(DocshiftError::new(
                &format!("Session {} was already committed or aborted", self.inner.id),
                ErrorKind::TransactionError,
            )),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct InMemorySessionInner {
    id: String,
    label: Option<String>,
    state: Mutex<TxState>,
    commit_lock: Arc<Mutex<()>>,
}

impl Drop for InMemorySessionInner {
    fn drop(&mut self) {
        // abandoned while active: discard the staged write set
        let state = self.state.get_mut();
        let staged_len = match &*state {
            TxState::Active(staged) => staged.len(),
            _ => return,
        };
        if staged_len > 0 {
            log::warn!(
                "Session {}{} dropped with {} staged operation(s); aborting",
                self.id,
                self.label
                    .as_deref()
                    .map(|l| format!(" ({})", l))
                    .unwrap_or_default(),
                staged_len
            );
        }
        *state = TxState::Aborted;
    }
}
