use crate::catalog::MigrationCatalog;
use crate::common::{CancellationToken, VersionId};
use crate::errors::{DocshiftError, DocshiftResult, ErrorKind};
use crate::ledger::{HistoryLedger, HistoryRecord};
use crate::lock::DistributedLock;
use crate::migration::MigrationUnit;
use crate::migration_options::{MigrationOptions, ParallelRunsBehavior, TransactionScope};
use crate::migration_result::MigrationResult;
use crate::migrator_builder::MigratorBuilder;
use crate::store::{Database, ExecutionContext, StoreClient, StoreSession};
use chrono::Utc;
use std::sync::Arc;

/// The orchestration core.
///
/// A migrator owns no long-lived mutable state beyond its configuration and
/// collection handles; the history ledger and the lock record live entirely
/// in the backing store. One `migrate()` call is a single long cooperative
/// operation - no internal parallelism - and concurrent runs from other
/// processes are serialized by the distributed lock.
///
/// # Usage
/// ```ignore
/// let migrator = Migrator::builder()
///     .client(InMemoryClient::new())
///     .catalog(catalog)
///     .database_name("warehouse")
///     .build()?;
///
/// let result = migrator.migrate()?;                       // to latest
/// let result = migrator.migrate_to(Some("0.0.1".parse()?))?; // rollback
/// ```
#[derive(Clone)]
pub struct Migrator {
    inner: Arc<MigratorInner>,
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator").finish_non_exhaustive()
    }
}

impl Migrator {
    /// Starts a [`MigratorBuilder`].
    pub fn builder() -> MigratorBuilder {
        MigratorBuilder::new()
    }

    pub(crate) fn from_parts(
        client: StoreClient,
        catalog: Arc<dyn MigrationCatalog>,
        options: MigrationOptions,
    ) -> DocshiftResult<Self> {
        let database = client.database(options.database_name())?;
        let ledger = HistoryLedger::new(database.collection(options.history_collection())?);
        let lock = DistributedLock::new(database.collection(&options.lock_collection())?);

        Ok(Migrator {
            inner: Arc::new(MigratorInner {
                database,
                catalog,
                options,
                ledger,
                lock,
            }),
        })
    }

    /// Migrates to the latest known version.
    pub fn migrate(&self) -> DocshiftResult<MigrationResult> {
        self.migrate_with(None, &CancellationToken::new())
    }

    /// Migrates to the given target version, or to latest when `None`.
    ///
    /// A target below the current version rolls back everything above it; a
    /// target equal to the current version is a no-op.
    pub fn migrate_to(&self, target: Option<VersionId>) -> DocshiftResult<MigrationResult> {
        self.migrate_with(target, &CancellationToken::new())
    }

    /// Full form of [`migrate_to`](Self::migrate_to) with a cancellation
    /// token checked at every storage boundary. Cancellation never rolls
    /// back committed work; it only prevents new work from starting.
    pub fn migrate_with(
        &self,
        target: Option<VersionId>,
        token: &CancellationToken,
    ) -> DocshiftResult<MigrationResult> {
        self.inner.run(target, token)
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.inner.options
    }

    pub fn database(&self) -> &Database {
        &self.inner.database
    }
}

struct MigratorInner {
    database: Database,
    catalog: Arc<dyn MigrationCatalog>,
    options: MigrationOptions,
    ledger: HistoryLedger,
    lock: DistributedLock,
}

impl MigratorInner {
    fn run(
        &self,
        target: Option<VersionId>,
        token: &CancellationToken,
    ) -> DocshiftResult<MigrationResult> {
        let start_time = Utc::now();

        // discovery failures (duplicate versions, broken factories) are fatal
        // before any lock or ledger interaction
        let units = self.catalog.locate()?;

        token.checkpoint()?;

        if !self.lock.try_acquire()? {
            return match self.options.parallel_runs_behavior() {
                ParallelRunsBehavior::Cancel => {
                    log::info!(
                        "Migration of '{}' skipped: another run is in progress",
                        self.options.database_name()
                    );
                    Ok(MigrationResult::cancelled(start_time))
                }
                ParallelRunsBehavior::Throw => Err(DocshiftError::new(
                    &format!(
                        "Another migration run against '{}' is in progress",
                        self.options.database_name()
                    ),
                    ErrorKind::MigrationInProgress,
                )),
            };
        }

        let outcome = self.run_locked(units, target, token, start_time);

        // the lock is never left held, whichever way the run went
        if let Err(release_error) = self.lock.release() {
            log::error!("Failed to release migration lock: {}", release_error);
            return match outcome {
                Ok(_) => Err(release_error),
                // the run's own error wins over the release failure
                Err(run_error) => Err(run_error),
            };
        }

        outcome
    }

    fn run_locked(
        &self,
        units: Vec<MigrationUnit>,
        target: Option<VersionId>,
        token: &CancellationToken,
        start_time: chrono::DateTime<Utc>,
    ) -> DocshiftResult<MigrationResult> {
        self.ledger.ensure_index()?;

        let initial_version = self.ledger.current_version()?;
        let current = initial_version.unwrap_or(VersionId::ZERO);

        let plan = plan_migrations(&units, current, target);

        if plan.units.is_empty() {
            log::info!(
                "Database '{}' is already at {}; nothing to apply",
                self.options.database_name(),
                initial_version
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "no version".to_string())
            );
            return Ok(MigrationResult::completed(
                start_time,
                initial_version,
                initial_version,
                Vec::new(),
            ));
        }

        log::info!(
            "{} {} migration(s) against '{}' (current {}, target {})",
            match plan.direction {
                MigrationDirection::Up => "Applying",
                MigrationDirection::Down => "Rolling back",
            },
            plan.units.len(),
            self.options.database_name(),
            current,
            target
                .map(|v| v.to_string())
                .unwrap_or_else(|| "latest".to_string())
        );

        self.apply_plan(&plan, token)?;

        let final_version = self.ledger.current_version()?;
        log::info!(
            "Database '{}' migrated to {}",
            self.options.database_name(),
            final_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "no version".to_string())
        );

        Ok(MigrationResult::completed(
            start_time,
            initial_version,
            final_version,
            plan.units,
        ))
    }

    fn apply_plan(&self, plan: &MigrationPlan, token: &CancellationToken) -> DocshiftResult<()> {
        match self.options.transaction_scope() {
            TransactionScope::None => {
                let ctx = ExecutionContext::NoTransaction;
                for unit in &plan.units {
                    token.checkpoint()?;
                    self.apply_unit(unit, plan.direction, &ctx)?;
                }
                Ok(())
            }
            TransactionScope::SingleMigration => {
                for unit in &plan.units {
                    token.checkpoint()?;
                    let session = self.database.begin_session(self.options.session_options())?;
                    let ctx = ExecutionContext::Transactional(session.clone());
                    match self.apply_unit(unit, plan.direction, &ctx) {
                        Ok(()) => session.commit()?,
                        Err(e) => {
                            abort_best_effort(&session, &e);
                            return Err(e);
                        }
                    }
                }
                Ok(())
            }
            TransactionScope::AllMigrations => {
                let session = self.database.begin_session(self.options.session_options())?;
                let ctx = ExecutionContext::Transactional(session.clone());
                for unit in &plan.units {
                    let step = token
                        .checkpoint()
                        .and_then(|_| self.apply_unit(unit, plan.direction, &ctx));
                    if let Err(e) = step {
                        abort_best_effort(&session, &e);
                        return Err(e);
                    }
                }
                session.commit()
            }
        }
    }

    fn apply_unit(
        &self,
        unit: &MigrationUnit,
        direction: MigrationDirection,
        ctx: &ExecutionContext,
    ) -> DocshiftResult<()> {
        match direction {
            MigrationDirection::Up => {
                log::info!("Applying migration {} '{}'", unit.version(), unit.name());
                unit.up(&self.database, ctx)?;
                // history write strictly after the body: a crash in between
                // never records a body that did not run
                let record = HistoryRecord::new(unit.version(), &unit.name());
                self.ledger.record_applied(&record, ctx)
            }
            MigrationDirection::Down => {
                log::info!("Rolling back migration {} '{}'", unit.version(), unit.name());
                unit.down(&self.database, ctx)?;
                self.ledger.record_rolled_back(&unit.version(), ctx)
            }
        }
    }
}

/// Aborts the session after a failed unit, without letting an abort failure
/// mask the original error.
fn abort_best_effort(session: &StoreSession, original: &DocshiftError) {
    if let Err(abort_error) = session.abort() {
        log::error!(
            "Failed to abort transaction after '{}': {}",
            original,
            abort_error
        );
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MigrationDirection {
    Up,
    Down,
}

struct MigrationPlan {
    direction: MigrationDirection,
    units: Vec<MigrationUnit>,
}

/// Computes the applicable subset and direction.
///
/// Upgrade (no target, or target above current): units strictly above the
/// current version, ascending, stopping past the target. Units at or below
/// the current version are always excluded, so re-running is idempotent.
///
/// Downgrade (target at or below current): units above the target and at or
/// below the current version, descending - a strict rollback of everything
/// applied beyond the target. Units above the current version were never
/// applied and are never rolled back.
fn plan_migrations(
    units: &[MigrationUnit],
    current: VersionId,
    target: Option<VersionId>,
) -> MigrationPlan {
    let is_upgrade = match target {
        None => true,
        Some(t) => t > current,
    };

    if is_upgrade {
        let applicable = units
            .iter()
            .filter(|unit| unit.version() > current)
            .take_while(|unit| target.map_or(true, |t| unit.version() <= t))
            .cloned()
            .collect();
        MigrationPlan {
            direction: MigrationDirection::Up,
            units: applicable,
        }
    } else {
        let floor = target.unwrap_or(VersionId::ZERO);
        let applicable = units
            .iter()
            .filter(|unit| unit.version() > floor && unit.version() <= current)
            .rev()
            .cloned()
            .collect();
        MigrationPlan {
            direction: MigrationDirection::Down,
            units: applicable,
        }
    }
}
