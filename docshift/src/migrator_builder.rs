use crate::catalog::MigrationCatalog;
use crate::errors::{DocshiftError, DocshiftResult, ErrorKind};
use crate::migration_options::{MigrationOptions, ParallelRunsBehavior, TransactionScope};
use crate::migrator::Migrator;
use crate::store::{SessionOptions, StoreClient, StoreClientProvider};
use std::sync::Arc;

/// Builder for creating and configuring a [`Migrator`].
///
/// `MigratorBuilder` provides a fluent API for wiring the store client, the
/// migration catalog, and the options together. It follows the builder
/// pattern and captures errors during configuration to ensure they are
/// propagated when building the migrator - configuration errors fail here,
/// never inside `migrate()`.
///
/// # Examples
///
/// ```rust,ignore
/// let migrator = Migrator::builder()
///     .client(InMemoryClient::new())
///     .catalog(catalog)
///     .database_name("warehouse")
///     .transaction_scope(TransactionScope::SingleMigration)
///     .build()?;
/// ```
#[derive(Default)]
pub struct MigratorBuilder {
    error: Option<DocshiftError>,
    client: Option<StoreClient>,
    catalog: Option<Arc<dyn MigrationCatalog>>,
    options: Option<MigrationOptions>,
    database_name: Option<String>,
    history_collection: Option<String>,
    transaction_scope: TransactionScope,
    session_options: SessionOptions,
    parallel_runs_behavior: ParallelRunsBehavior,
}

impl MigratorBuilder {
    pub fn new() -> Self {
        MigratorBuilder::default()
    }

    /// Sets the store client for the target database.
    pub fn client(mut self, client: impl StoreClientProvider + 'static) -> Self {
        self.client = Some(StoreClient::new(client));
        self
    }

    /// Sets an already-wrapped store client.
    pub fn store_client(mut self, client: StoreClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the migration catalog.
    pub fn catalog(mut self, catalog: impl MigrationCatalog + 'static) -> Self {
        self.catalog = Some(Arc::new(catalog));
        self
    }

    /// Sets complete options, overriding the individual option setters.
    pub fn options(mut self, options: MigrationOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Sets the target database name (required unless [`options`](Self::options)
    /// is used).
    pub fn database_name(mut self, name: &str) -> Self {
        self.database_name = Some(name.to_string());
        self
    }

    /// Overrides the history collection name.
    pub fn history_collection(mut self, name: &str) -> Self {
        self.history_collection = Some(name.to_string());
        self
    }

    pub fn transaction_scope(mut self, scope: TransactionScope) -> Self {
        self.transaction_scope = scope;
        self
    }

    pub fn session_options(mut self, session_options: SessionOptions) -> Self {
        self.session_options = session_options;
        self
    }

    pub fn parallel_runs_behavior(mut self, behavior: ParallelRunsBehavior) -> Self {
        self.parallel_runs_behavior = behavior;
        self
    }

    /// Builds the migrator with the configured settings.
    ///
    /// # Returns
    ///
    /// `Ok(Migrator)` when the configuration is complete and valid, or
    /// `Err(DocshiftError)` for a missing client/catalog, a missing database
    /// name, or a blank name - any error captured during configuration is
    /// returned here.
    pub fn build(self) -> DocshiftResult<Migrator> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let client = self.client.ok_or_else(|| {
            DocshiftError::new("A store client is required", ErrorKind::ValidationError)
        })?;
        let catalog = self.catalog.ok_or_else(|| {
            DocshiftError::new("A migration catalog is required", ErrorKind::ValidationError)
        })?;

        let options = match self.options {
            Some(options) => options,
            None => {
                let database_name = self.database_name.ok_or_else(|| {
                    DocshiftError::new("A database name is required", ErrorKind::ValidationError)
                })?;
                let mut options = MigrationOptions::new(&database_name)?;
                if let Some(history) = self.history_collection {
                    options = options.with_history_collection(&history)?;
                }
                options
                    .with_transaction_scope(self.transaction_scope)
                    .with_session_options(self.session_options)
                    .with_parallel_runs_behavior(self.parallel_runs_behavior)
            }
        };

        Migrator::from_parts(client, catalog, options)
    }
}
