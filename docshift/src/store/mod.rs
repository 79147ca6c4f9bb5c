//! Storage abstraction for the target document database.
//!
//! The migrator never talks to a database driver directly. Everything it
//! needs - the history collection, the lock collection, and whatever
//! collections migration bodies touch - goes through the small provider
//! layer defined here. A backend implements the `*Provider` traits; callers
//! hold the cheap, cloneable wrapper types (`StoreClient`, `Database`,
//! `DocumentCollection`, `StoreSession`) that delegate to an
//! `Arc<dyn Provider>`.
//!
//! The crate ships one complete backend, [`memory`], used by the test suite
//! and embeddable by hosts that want an in-process target.

pub mod document;
pub mod memory;

pub use document::{normalize_field, Document, Filter, Value};

use crate::errors::DocshiftResult;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Connection-level entry point: resolves databases by name.
///
/// Implementers must be `Send + Sync`; a single client is shared by every
/// migrator (and every process-local thread) that targets the same backend.
pub trait StoreClientProvider: Send + Sync {
    /// Opens a handle to the named database, creating it if the backend
    /// creates databases lazily.
    fn database(&self, name: &str) -> DocshiftResult<Database>;
}

/// Cloneable handle over a [`StoreClientProvider`].
#[derive(Clone)]
pub struct StoreClient {
    inner: Arc<dyn StoreClientProvider>,
}

impl StoreClient {
    pub fn new(provider: impl StoreClientProvider + 'static) -> Self {
        StoreClient {
            inner: Arc::new(provider),
        }
    }

    pub fn database(&self, name: &str) -> DocshiftResult<Database> {
        self.inner.database(name)
    }
}

impl Debug for StoreClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "StoreClient")
    }
}

/// A single database: a namespace of document collections plus the session
/// factory for transactional work.
pub trait DatabaseProvider: Send + Sync {
    fn name(&self) -> String;

    /// Opens a handle to the named collection, creating it lazily.
    fn collection(&self, name: &str) -> DocshiftResult<DocumentCollection>;

    /// Drops the named collection and its indexes. Dropping an absent
    /// collection is a no-op.
    fn drop_collection(&self, name: &str) -> DocshiftResult<()>;

    fn collection_names(&self) -> DocshiftResult<Vec<String>>;

    /// Begins a session holding a single transaction.
    fn begin_session(&self, options: &SessionOptions) -> DocshiftResult<StoreSession>;
}

/// Cloneable handle over a [`DatabaseProvider`].
#[derive(Clone)]
pub struct Database {
    inner: Arc<dyn DatabaseProvider>,
}

impl Database {
    pub fn new(provider: impl DatabaseProvider + 'static) -> Self {
        Database {
            inner: Arc::new(provider),
        }
    }

    pub fn name(&self) -> String {
        self.inner.name()
    }

    pub fn collection(&self, name: &str) -> DocshiftResult<DocumentCollection> {
        self.inner.collection(name)
    }

    pub fn drop_collection(&self, name: &str) -> DocshiftResult<()> {
        self.inner.drop_collection(name)
    }

    pub fn collection_names(&self) -> DocshiftResult<Vec<String>> {
        self.inner.collection_names()
    }

    pub fn begin_session(&self, options: &SessionOptions) -> DocshiftResult<StoreSession> {
        self.inner.begin_session(options)
    }
}

impl Debug for Database {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Database({})", self.name())
    }
}

/// A document collection.
///
/// Write operations take an [`ExecutionContext`]: under
/// `ExecutionContext::NoTransaction` they apply immediately; under
/// `ExecutionContext::Transactional` they join the session's write set and
/// take effect at commit.
pub trait CollectionProvider: Send + Sync {
    fn name(&self) -> String;

    /// Inserts one document. Fails with `UniqueConstraintViolation` if a
    /// unique index rejects it.
    fn insert_one(&self, document: Document, ctx: &ExecutionContext) -> DocshiftResult<()>;

    /// Deletes every document matching the filter; returns the number of
    /// documents removed (0 under a transactional context, where the count
    /// is not known until commit).
    fn delete_matching(&self, filter: &Filter, ctx: &ExecutionContext) -> DocshiftResult<u64>;

    /// Returns all committed documents.
    fn find_all(&self) -> DocshiftResult<Vec<Document>>;

    fn count(&self) -> DocshiftResult<u64>;

    /// Idempotently ensures a unique index over the given fields. Fails with
    /// `UniqueConstraintViolation` if existing data already violates it.
    fn ensure_unique_index(&self, fields: &[&str]) -> DocshiftResult<()>;
}

/// Cloneable handle over a [`CollectionProvider`].
#[derive(Clone)]
pub struct DocumentCollection {
    inner: Arc<dyn CollectionProvider>,
}

impl DocumentCollection {
    pub fn new(provider: impl CollectionProvider + 'static) -> Self {
        DocumentCollection {
            inner: Arc::new(provider),
        }
    }

    pub fn name(&self) -> String {
        self.inner.name()
    }

    pub fn insert_one(&self, document: Document, ctx: &ExecutionContext) -> DocshiftResult<()> {
        self.inner.insert_one(document, ctx)
    }

    pub fn delete_matching(&self, filter: &Filter, ctx: &ExecutionContext) -> DocshiftResult<u64> {
        self.inner.delete_matching(filter, ctx)
    }

    pub fn find_all(&self) -> DocshiftResult<Vec<Document>> {
        self.inner.find_all()
    }

    pub fn count(&self) -> DocshiftResult<u64> {
        self.inner.count()
    }

    pub fn ensure_unique_index(&self, fields: &[&str]) -> DocshiftResult<()> {
        self.inner.ensure_unique_index(fields)
    }
}

impl Debug for DocumentCollection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DocumentCollection({})", self.name())
    }
}

/// A session holding one transaction.
///
/// `commit` and `abort` are terminal: calling either a second time is a
/// `TransactionError`. A session whose last handle is dropped while still
/// active is aborted best-effort by the backend.
///
/// Visibility is write-staged and read-committed: reads performed while the
/// session is active observe only committed state, not the session's own
/// staged writes.
pub trait SessionProvider: Send + Sync {
    fn id(&self) -> String;

    fn is_active(&self) -> bool;

    /// Atomically applies the staged write set. If any staged operation is
    /// rejected (e.g. by a unique index) the whole set is rolled back and the
    /// session ends aborted.
    fn commit(&self) -> DocshiftResult<()>;

    /// Discards the staged write set.
    fn abort(&self) -> DocshiftResult<()>;

    /// Backend-specific downcast hook used by collections to reach their own
    /// session type.
    fn as_any(&self) -> &dyn Any;
}

/// Cloneable handle over a [`SessionProvider`].
#[derive(Clone)]
pub struct StoreSession {
    inner: Arc<dyn SessionProvider>,
}

impl StoreSession {
    pub fn new(provider: impl SessionProvider + 'static) -> Self {
        StoreSession {
            inner: Arc::new(provider),
        }
    }

    pub fn id(&self) -> String {
        self.inner.id()
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    pub fn commit(&self) -> DocshiftResult<()> {
        self.inner.commit()
    }

    pub fn abort(&self) -> DocshiftResult<()> {
        self.inner.abort()
    }

    pub fn provider(&self) -> &dyn SessionProvider {
        self.inner.as_ref()
    }
}

impl Debug for StoreSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "StoreSession({})", self.id())
    }
}

/// Options applied when beginning a session.
///
/// The label, when set, is carried into backend log lines so overlapping
/// sessions can be told apart.
#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    label: Option<String>,
}

impl SessionOptions {
    pub fn new() -> Self {
        SessionOptions::default()
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// The transactional context threaded through every body and ledger call.
///
/// The three transaction scopes differ only in how this context is
/// constructed and committed: `None` passes `NoTransaction` everywhere,
/// `SingleMigration` builds a fresh `Transactional` context per unit, and
/// `AllMigrations` shares one for the whole batch.
#[derive(Clone, Debug)]
pub enum ExecutionContext {
    /// Operations apply immediately and independently.
    NoTransaction,
    /// Operations join the session's write set and take effect at commit.
    Transactional(StoreSession),
}

impl ExecutionContext {
    pub fn session(&self) -> Option<&StoreSession> {
        match self {
            ExecutionContext::NoTransaction => None,
            ExecutionContext::Transactional(session) => Some(session),
        }
    }

    pub fn is_transactional(&self) -> bool {
        matches!(self, ExecutionContext::Transactional(_))
    }
}
