use crate::common::FIELD_ID;
use crate::errors::{DocshiftError, DocshiftResult, ErrorKind};
use crate::store::memory::session::{InMemorySession, StagedOp};
use crate::store::{CollectionProvider, Document, ExecutionContext, Filter, Value};
use crossbeam_skiplist::SkipMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// In-memory document collection.
///
/// Documents are stored in a concurrent skip list keyed by their `_id` field
/// (generated when absent). Unique-index bookkeeping lives behind a mutex so
/// a constraint check and the insert it guards are a single atomic step -
/// that atomicity is what the distributed lock's insert-if-absent acquire
/// relies on.
#[derive(Clone)]
pub struct InMemoryCollection {
    inner: Arc<InMemoryCollectionInner>,
}

impl InMemoryCollection {
    pub(crate) fn new(name: &str, database_name: &str) -> Self {
        InMemoryCollection {
            inner: Arc::new(InMemoryCollectionInner {
                name: name.to_string(),
                database_name: database_name.to_string(),
                documents: SkipMap::new(),
                indexes: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Inserts a document immediately, enforcing unique constraints.
    ///
    /// Returns the document id (assigned when the document carried none).
    pub(crate) fn insert_direct(&self, mut document: Document) -> DocshiftResult<String> {
        let id = match document.get(FIELD_ID) {
            Some(Value::Text(id)) => id.clone(),
            Some(_) => {
                return Err(DocshiftError::new(
                    &format!(
                        "Field '{}' in collection '{}' must be a text value",
                        FIELD_ID, self.inner.name
                    ),
                    ErrorKind::ValidationError,
                ));
            }
            None => {
                let id = Uuid::new_v4().to_string();
                document.put(FIELD_ID, id.as_str())?;
                id
            }
        };

        let mut indexes = self.inner.indexes.lock();

        if self.inner.documents.contains_key(&id) {
            return Err(DocshiftError::new(
                &format!(
                    "Document with id '{}' already exists in collection '{}'",
                    id, self.inner.name
                ),
                ErrorKind::UniqueConstraintViolation,
            ));
        }

        for index in indexes.iter() {
            let key = index.key_for(&document);
            if index.keys.contains_key(&key) {
                return Err(DocshiftError::new(
                    &format!(
                        "Unique index on ({}) in collection '{}' rejected insert",
                        index.fields.join(", "),
                        self.inner.name
                    ),
                    ErrorKind::UniqueConstraintViolation,
                ));
            }
        }

        for index in indexes.iter_mut() {
            let key = index.key_for(&document);
            index.keys.insert(key, id.clone());
        }
        self.inner.documents.insert(id.clone(), document);

        log::debug!(
            "Inserted document {} into {}.{}",
            id,
            self.inner.database_name,
            self.inner.name
        );
        Ok(id)
    }

    /// Removes every document matching the filter immediately; returns the
    /// removed documents so a transactional caller can undo the removal.
    pub(crate) fn remove_direct(&self, filter: &Filter) -> DocshiftResult<Vec<Document>> {
        let mut indexes = self.inner.indexes.lock();

        let matching: Vec<(String, Document)> = self
            .inner
            .documents
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        for (id, document) in &matching {
            self.inner.documents.remove(id);
            for index in indexes.iter_mut() {
                let key = index.key_for(document);
                index.keys.remove(&key);
            }
        }

        Ok(matching.into_iter().map(|(_, doc)| doc).collect())
    }

    /// Removes a document by id, bypassing filters. Undo path for a
    /// committed insert.
    pub(crate) fn remove_by_id_direct(&self, id: &str) {
        let mut indexes = self.inner.indexes.lock();
        if let Some(entry) = self.inner.documents.remove(id) {
            for index in indexes.iter_mut() {
                let key = index.key_for(entry.value());
                index.keys.remove(&key);
            }
        }
    }

    /// Reinserts previously removed documents without constraint checks.
    /// Undo path for a committed delete; the documents were valid before the
    /// delete, so their index keys are restored as-is.
    pub(crate) fn restore_direct(&self, documents: Vec<Document>) {
        let mut indexes = self.inner.indexes.lock();
        for document in documents {
            let id = match document.get(FIELD_ID) {
                Some(Value::Text(id)) => id.clone(),
                _ => continue,
            };
            for index in indexes.iter_mut() {
                let key = index.key_for(&document);
                index.keys.insert(key, id.clone());
            }
            self.inner.documents.insert(id, document);
        }
    }

    fn session_of<'a>(&self, ctx: &'a ExecutionContext) -> DocshiftResult<Option<&'a InMemorySession>> {
        match ctx.session() {
            None => Ok(None),
            Some(session) => session
                .provider()
                .as_any()
                .downcast_ref::<InMemorySession>()
                .map(Some)
                .ok_or_else(|| {
                    DocshiftError::new(
                        &format!(
                            "Session {} does not belong to the in-memory store",
                            session.id()
                        ),
                        ErrorKind::InvalidOperation,
                    )
                }),
        }
    }
}

impl CollectionProvider for InMemoryCollection {
    fn name(&self) -> String {
        self.inner.name.clone()
    }

    fn insert_one(&self, document: Document, ctx: &ExecutionContext) -> DocshiftResult<()> {
        match self.session_of(ctx)? {
            None => self.insert_direct(document).map(|_| ()),
            Some(session) => session.stage(StagedOp::Insert {
                collection: self.clone(),
                document,
            }),
        }
    }

    fn delete_matching(&self, filter: &Filter, ctx: &ExecutionContext) -> DocshiftResult<u64> {
        match self.session_of(ctx)? {
            None => Ok(self.remove_direct(filter)?.len() as u64),
            Some(session) => {
                session.stage(StagedOp::Delete {
                    collection: self.clone(),
                    filter: filter.clone(),
                })?;
                // staged; the affected count is not known until commit
                Ok(0)
            }
        }
    }

    fn find_all(&self) -> DocshiftResult<Vec<Document>> {
        Ok(self
            .inner
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn count(&self) -> DocshiftResult<u64> {
        Ok(self.inner.documents.len() as u64)
    }

    fn ensure_unique_index(&self, fields: &[&str]) -> DocshiftResult<()> {
        if fields.is_empty() {
            return Err(DocshiftError::new(
                "A unique index needs at least one field",
                ErrorKind::ValidationError,
            ));
        }

        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let mut indexes = self.inner.indexes.lock();

        if indexes.iter().any(|index| index.fields == fields) {
            return Ok(());
        }

        // existing data must already satisfy the constraint
        let mut keys: HashMap<Vec<Value>, String> = HashMap::new();
        for entry in self.inner.documents.iter() {
            let key = key_for(&fields, entry.value());
            if let Some(existing) = keys.insert(key, entry.key().clone()) {
                return Err(DocshiftError::new(
                    &format!(
                        "Cannot create unique index on ({}) in collection '{}': documents '{}' and '{}' collide",
                        fields.join(", "),
                        self.inner.name,
                        existing,
                        entry.key()
                    ),
                    ErrorKind::UniqueConstraintViolation,
                ));
            }
        }

        log::debug!(
            "Created unique index on ({}) in {}.{}",
            fields.join(", "),
            self.inner.database_name,
            self.inner.name
        );
        indexes.push(UniqueIndex { fields, keys });
        Ok(())
    }
}

struct InMemoryCollectionInner {
    name: String,
    database_name: String,
    documents: SkipMap<String, Document>,
    indexes: Mutex<Vec<UniqueIndex>>,
}

struct UniqueIndex {
    fields: Vec<String>,
    keys: HashMap<Vec<Value>, String>,
}

impl UniqueIndex {
    fn key_for(&self, document: &Document) -> Vec<Value> {
        key_for(&self.fields, document)
    }
}

fn key_for(fields: &[String], document: &Document) -> Vec<Value> {
    fields
        .iter()
        .map(|field| document.get(field).cloned().unwrap_or(Value::Null))
        .collect()
}
