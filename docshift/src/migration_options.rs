use crate::common::{DEFAULT_HISTORY_COLLECTION, LOCK_COLLECTION_SUFFIX};
use crate::errors::{DocshiftError, DocshiftResult, ErrorKind};
use crate::store::SessionOptions;

/// Policy governing whether and how migrations share a database transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransactionScope {
    /// No session: each unit applies independently. A mid-sequence failure
    /// leaves all prior units' effects and ledger entries intact.
    #[default]
    None,
    /// One transaction per unit: a failing unit's effect and ledger entry
    /// roll back together; prior units stay committed.
    SingleMigration,
    /// One transaction for the whole batch: any failure leaves the database
    /// exactly as it was before the run.
    AllMigrations,
}

/// Policy applied when lock acquisition fails because another run is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParallelRunsBehavior {
    /// Return a cancelled-shaped result; not an error.
    #[default]
    Cancel,
    /// Raise a `MigrationInProgress` error.
    Throw,
}

/// Configuration for a [`Migrator`](crate::migrator::Migrator).
///
/// Validation happens at construction: a blank database or history-collection
/// name never reaches `migrate()`.
///
/// # Examples
///
/// ```rust,ignore
/// let options = MigrationOptions::new("warehouse")?
///     .with_history_collection("schema_history")?
///     .with_transaction_scope(TransactionScope::SingleMigration);
/// ```
#[derive(Clone, Debug)]
pub struct MigrationOptions {
    database_name: String,
    history_collection: String,
    transaction_scope: TransactionScope,
    session_options: SessionOptions,
    parallel_runs_behavior: ParallelRunsBehavior,
}

impl MigrationOptions {
    /// Creates options for the given target database with defaults: history
    /// collection `_migrations`, no transaction, `Cancel` on parallel runs.
    ///
    /// # Returns
    /// * `Err` with kind `ValidationError` if the database name is blank
    pub fn new(database_name: &str) -> DocshiftResult<Self> {
        if database_name.trim().is_empty() {
            return Err(DocshiftError::new(
                "Database name must not be blank",
                ErrorKind::ValidationError,
            ));
        }
        Ok(MigrationOptions {
            database_name: database_name.to_string(),
            history_collection: DEFAULT_HISTORY_COLLECTION.to_string(),
            transaction_scope: TransactionScope::default(),
            session_options: SessionOptions::default(),
            parallel_runs_behavior: ParallelRunsBehavior::default(),
        })
    }

    /// Overrides the history collection name.
    ///
    /// # Returns
    /// * `Err` with kind `ValidationError` if the name is blank
    pub fn with_history_collection(mut self, name: &str) -> DocshiftResult<Self> {
        if name.trim().is_empty() {
            return Err(DocshiftError::new(
                "History collection name must not be blank",
                ErrorKind::ValidationError,
            ));
        }
        self.history_collection = name.to_string();
        Ok(self)
    }

    pub fn with_transaction_scope(mut self, scope: TransactionScope) -> Self {
        self.transaction_scope = scope;
        self
    }

    pub fn with_session_options(mut self, session_options: SessionOptions) -> Self {
        self.session_options = session_options;
        self
    }

    pub fn with_parallel_runs_behavior(mut self, behavior: ParallelRunsBehavior) -> Self {
        self.parallel_runs_behavior = behavior;
        self
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn history_collection(&self) -> &str {
        &self.history_collection
    }

    /// The lock collection name, derived from the history collection name.
    pub fn lock_collection(&self) -> String {
        format!("{}{}", self.history_collection, LOCK_COLLECTION_SUFFIX)
    }

    pub fn transaction_scope(&self) -> TransactionScope {
        self.transaction_scope
    }

    pub fn session_options(&self) -> &SessionOptions {
        &self.session_options
    }

    pub fn parallel_runs_behavior(&self) -> ParallelRunsBehavior {
        self.parallel_runs_behavior
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = MigrationOptions::new("warehouse").unwrap();
        assert_eq!(options.database_name(), "warehouse");
        assert_eq!(options.history_collection(), "_migrations");
        assert_eq!(options.lock_collection(), "_migrations.lock");
        assert_eq!(options.transaction_scope(), TransactionScope::None);
        assert_eq!(
            options.parallel_runs_behavior(),
            ParallelRunsBehavior::Cancel
        );
    }

    #[test]
    fn test_blank_database_name_rejected() {
        for name in ["", "   "] {
            let err = MigrationOptions::new(name).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ValidationError);
        }
    }

    #[test]
    fn test_blank_history_collection_rejected() {
        let options = MigrationOptions::new("warehouse").unwrap();
        let err = options.with_history_collection("  ").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_custom_history_collection_drives_lock_name() {
        let options = MigrationOptions::new("warehouse")
            .unwrap()
            .with_history_collection("schema_history")
            .unwrap();
        assert_eq!(options.history_collection(), "schema_history");
        assert_eq!(options.lock_collection(), "schema_history.lock");
    }

    #[test]
    fn test_fluent_setters() {
        let options = MigrationOptions::new("warehouse")
            .unwrap()
            .with_transaction_scope(TransactionScope::AllMigrations)
            .with_parallel_runs_behavior(ParallelRunsBehavior::Throw);
        assert_eq!(options.transaction_scope(), TransactionScope::AllMigrations);
        assert_eq!(options.parallel_runs_behavior(), ParallelRunsBehavior::Throw);
    }
}
