use crate::common::VersionId;
use crate::migration::MigrationUnit;
use chrono::{DateTime, Utc};

/// Summary of one `migrate()` call.
///
/// Produced fresh per run and never persisted. `applied_migrations` lists the
/// units applied this run in application order (ascending for an upgrade,
/// descending for a rollback). A run that lost the migration lock under the
/// `Cancel` policy is `cancelled()` and carries no version information,
/// because nothing was read or written.
#[derive(Clone, Debug)]
pub struct MigrationResult {
    start_time: DateTime<Utc>,
    finish_time: DateTime<Utc>,
    initial_version: Option<VersionId>,
    final_version: Option<VersionId>,
    applied_migrations: Vec<MigrationUnit>,
    cancelled: bool,
}

impl MigrationResult {
    pub(crate) fn completed(
        start_time: DateTime<Utc>,
        initial_version: Option<VersionId>,
        final_version: Option<VersionId>,
        applied_migrations: Vec<MigrationUnit>,
    ) -> Self {
        MigrationResult {
            start_time,
            finish_time: Utc::now(),
            initial_version,
            final_version,
            applied_migrations,
            cancelled: false,
        }
    }

    pub(crate) fn cancelled(start_time: DateTime<Utc>) -> Self {
        MigrationResult {
            start_time,
            finish_time: Utc::now(),
            initial_version: None,
            final_version: None,
            applied_migrations: Vec::new(),
            cancelled: true,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn finish_time(&self) -> DateTime<Utc> {
        self.finish_time
    }

    /// The ledger's version before the run, `None` for an empty history.
    pub fn initial_version(&self) -> Option<VersionId> {
        self.initial_version
    }

    /// The ledger's version after the run, `None` for an empty history.
    pub fn final_version(&self) -> Option<VersionId> {
        self.final_version
    }

    /// The units applied this run, in application order.
    pub fn applied_migrations(&self) -> &[MigrationUnit] {
        &self.applied_migrations
    }

    /// Convenience projection of [`applied_migrations`](Self::applied_migrations).
    pub fn applied_versions(&self) -> Vec<VersionId> {
        self.applied_migrations
            .iter()
            .map(|unit| unit.version())
            .collect()
    }

    /// True when the run gave up without inspecting the database because
    /// another process held the migration lock.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
