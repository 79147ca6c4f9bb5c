//! Migration-history ledger.
//!
//! The ledger is both the current-version oracle and the audit log: one
//! record exists per currently-applied migration, the record with the
//! maximum version defines the database's current version, and rolling a
//! migration back deletes its record.

use crate::common::{
    VersionId, FIELD_APPLIED_AT, FIELD_ID, FIELD_NAME, FIELD_VERSION_MAJOR, FIELD_VERSION_MINOR,
    FIELD_VERSION_PATCH, VERSION_FIELDS,
};
use crate::errors::{DocshiftError, DocshiftResult, ErrorKind};
use crate::store::{Document, DocumentCollection, ExecutionContext, Filter};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use uuid::Uuid;

/// One applied migration, as persisted in the history collection.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistoryRecord {
    id: String,
    version: VersionId,
    name: String,
    applied_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Creates a record for a migration applied now, with a fresh id.
    pub fn new(version: VersionId, name: &str) -> Self {
        HistoryRecord {
            id: Uuid::new_v4().to_string(),
            version,
            name: name.to_string(),
            applied_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> VersionId {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn applied_at(&self) -> DateTime<Utc> {
        self.applied_at
    }

    /// Converts the record to its persisted document form. The version is
    /// flattened into three fields so the uniqueness index can span them.
    pub fn to_document(&self) -> DocshiftResult<Document> {
        let mut doc = Document::new();
        doc.put(FIELD_ID, self.id.as_str())?;
        doc.put(FIELD_VERSION_MAJOR, self.version.major())?;
        doc.put(FIELD_VERSION_MINOR, self.version.minor())?;
        doc.put(FIELD_VERSION_PATCH, self.version.patch())?;
        doc.put(FIELD_NAME, self.name.as_str())?;
        doc.put(FIELD_APPLIED_AT, self.applied_at)?;
        Ok(doc)
    }

    /// Reads a record back from its persisted document form.
    pub fn from_document(doc: &Document) -> DocshiftResult<Self> {
        let read = || -> DocshiftResult<HistoryRecord> {
            Ok(HistoryRecord {
                id: doc.get_text(FIELD_ID)?.to_string(),
                version: VersionId::new(
                    doc.get_u32(FIELD_VERSION_MAJOR)?,
                    doc.get_u32(FIELD_VERSION_MINOR)?,
                    doc.get_u32(FIELD_VERSION_PATCH)?,
                ),
                name: doc.get_text(FIELD_NAME)?.to_string(),
                applied_at: doc.get_timestamp(FIELD_APPLIED_AT)?,
            })
        };
        read().map_err(|e| {
            DocshiftError::new_with_cause(
                "Malformed history record in the migration history collection",
                ErrorKind::ValidationError,
                e,
            )
        })
    }
}

/// Persisted append/delete log of applied migrations.
///
/// All reads and writes go through the wrapped history collection; the
/// migrator never touches it directly.
#[derive(Clone, Debug)]
pub struct HistoryLedger {
    collection: DocumentCollection,
}

impl HistoryLedger {
    pub fn new(collection: DocumentCollection) -> Self {
        HistoryLedger { collection }
    }

    /// Idempotently ensures the uniqueness constraint over the version
    /// triple, so racing processes inserting the same version fail fast
    /// instead of silently duplicating history.
    pub fn ensure_index(&self) -> DocshiftResult<()> {
        self.collection.ensure_unique_index(&VERSION_FIELDS)
    }

    /// The version of the record with the maximum version, or `None` when
    /// the history is empty. Uses the `VersionId` total order, never string
    /// or insertion order.
    pub fn current_version(&self) -> DocshiftResult<Option<VersionId>> {
        let records = self.records()?;
        Ok(records.first().map(|record| record.version()))
    }

    /// All history records, sorted descending by version.
    pub fn records(&self) -> DocshiftResult<Vec<HistoryRecord>> {
        let documents = self.collection.find_all()?;
        let records: Vec<HistoryRecord> = documents
            .iter()
            .map(HistoryRecord::from_document)
            .collect::<DocshiftResult<Vec<_>>>()?;
        Ok(records
            .into_iter()
            .sorted_by(|a, b| b.version().cmp(&a.version()))
            .collect())
    }

    /// Appends the record for a freshly applied migration.
    pub fn record_applied(
        &self,
        record: &HistoryRecord,
        ctx: &ExecutionContext,
    ) -> DocshiftResult<()> {
        log::debug!(
            "Recording applied migration {} '{}'",
            record.version(),
            record.name()
        );
        self.collection.insert_one(record.to_document()?, ctx)
    }

    /// Deletes the record matching exactly this version.
    pub fn record_rolled_back(
        &self,
        version: &VersionId,
        ctx: &ExecutionContext,
    ) -> DocshiftResult<()> {
        log::debug!("Recording rollback of migration {}", version);
        self.collection
            .delete_matching(&version_filter(version), ctx)?;
        Ok(())
    }

    pub fn collection(&self) -> &DocumentCollection {
        &self.collection
    }
}

fn version_filter(version: &VersionId) -> Filter {
    Filter::by(FIELD_VERSION_MAJOR, version.major())
        .and(FIELD_VERSION_MINOR, version.minor())
        .and(FIELD_VERSION_PATCH, version.patch())
}
