use crate::errors::{DocshiftError, DocshiftResult, ErrorKind};
use crate::store::memory::collection::InMemoryCollection;
use crate::store::memory::session::InMemorySession;
use crate::store::{
    Database, DatabaseProvider, DocumentCollection, SessionOptions, StoreClientProvider,
    StoreSession,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// In-memory store client.
///
/// Databases and collections are created lazily on first access and live for
/// the lifetime of the client. All data is lost when the client is dropped.
///
/// # Usage
/// ```ignore
/// let client = InMemoryClient::new();
/// let db = client.database("warehouse")?;
/// let coll = db.collection("inventory")?;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryClient {
    inner: Arc<InMemoryClientInner>,
}

impl InMemoryClient {
    pub fn new() -> Self {
        InMemoryClient {
            inner: Arc::new(InMemoryClientInner {
                databases: DashMap::new(),
            }),
        }
    }
}

impl StoreClientProvider for InMemoryClient {
    fn database(&self, name: &str) -> DocshiftResult<Database> {
        if name.trim().is_empty() {
            return Err(DocshiftError::new(
                "Database name must not be blank",
                ErrorKind::ValidationError,
            ));
        }

        let database = self
            .inner
            .databases
            .entry(name.to_string())
            .or_insert_with(|| InMemoryDatabase::new(name))
            .clone();
        Ok(Database::new(database))
    }
}

#[derive(Default)]
struct InMemoryClientInner {
    databases: DashMap<String, InMemoryDatabase>,
}

/// One in-memory database: a registry of collections and the commit lock
/// that serializes session commits against it.
#[derive(Clone)]
pub struct InMemoryDatabase {
    inner: Arc<InMemoryDatabaseInner>,
}

impl InMemoryDatabase {
    pub(crate) fn new(name: &str) -> Self {
        InMemoryDatabase {
            inner: Arc::new(InMemoryDatabaseInner {
                name: name.to_string(),
                collections: DashMap::new(),
                commit_lock: Arc::new(Mutex::new(())),
            }),
        }
    }
}

impl DatabaseProvider for InMemoryDatabase {
    fn name(&self) -> String {
        self.inner.name.clone()
    }

    fn collection(&self, name: &str) -> DocshiftResult<DocumentCollection> {
        if name.trim().is_empty() {
            return Err(DocshiftError::new(
                "Collection name must not be blank",
                ErrorKind::ValidationError,
            ));
        }

        let collection = self
            .inner
            .collections
            .entry(name.to_string())
            .or_insert_with(|| InMemoryCollection::new(name, &self.inner.name))
            .clone();
        Ok(DocumentCollection::new(collection))
    }

    fn drop_collection(&self, name: &str) -> DocshiftResult<()> {
        self.inner.collections.remove(name);
        log::debug!("Dropped collection {}.{}", self.inner.name, name);
        Ok(())
    }

    fn collection_names(&self) -> DocshiftResult<Vec<String>> {
        let mut names: Vec<String> = self
            .inner
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn begin_session(&self, options: &SessionOptions) -> DocshiftResult<StoreSession> {
        Ok(StoreSession::new(InMemorySession::new(
            options,
            self.inner.commit_lock.clone(),
        )))
    }
}

struct InMemoryDatabaseInner {
    name: String,
    collections: DashMap<String, InMemoryCollection>,
    commit_lock: Arc<Mutex<()>>,
}
