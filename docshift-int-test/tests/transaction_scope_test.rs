use docshift::common::CancellationToken;
use docshift::errors::ErrorKind;
use docshift::{TransactionScope, VersionId};
use docshift_int_test::test_util::{
    catalog_of, context_with, failing_up_unit, marker_unit, new_tracker, tracked_calls,
    tracked_unit,
};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn mixed_catalog() -> docshift::catalog::RegistryCatalog {
    catalog_of(vec![
        marker_unit("0.0.1"),
        failing_up_unit("0.0.2"),
        marker_unit("0.0.3"),
    ])
}

// ==================== TransactionScope::None ====================

#[test]
fn test_none_scope_keeps_prior_progress_on_failure() {
    let ctx = context_with(mixed_catalog(), TransactionScope::None).unwrap();

    let err = ctx.migrator.migrate().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::MigrationError);

    // the first unit's history entry and body effect survive; the failing
    // unit's body effect survives too because nothing scoped it
    assert_eq!(ctx.history_count(), 1);
    assert_eq!(ctx.marker_versions(), vec!["0.0.1", "0.0.2"]);
}

#[test]
fn test_none_scope_rerun_after_failure_resumes() {
    let ctx = context_with(mixed_catalog(), TransactionScope::None).unwrap();
    ctx.migrator.migrate().unwrap_err();

    // the failing unit fails again on resume; 0.0.1 is not reapplied
    let err = ctx.migrator.migrate().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::MigrationError);
    assert_eq!(ctx.history_count(), 1);
}

// ==================== TransactionScope::SingleMigration ====================

#[test]
fn test_single_migration_scope_rolls_back_failing_unit_only() {
    let ctx = context_with(mixed_catalog(), TransactionScope::SingleMigration).unwrap();

    let err = ctx.migrator.migrate().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::MigrationError);

    // unit 0.0.1 committed; unit 0.0.2's body write and ledger entry both
    // rolled back atomically; unit 0.0.3 never started
    assert_eq!(ctx.history_count(), 1);
    assert_eq!(ctx.marker_versions(), vec!["0.0.1"]);
}

#[test]
fn test_single_migration_scope_applies_all_on_success() {
    let ctx = context_with(
        catalog_of(vec![marker_unit("0.0.1"), marker_unit("0.0.2")]),
        TransactionScope::SingleMigration,
    )
    .unwrap();

    let result = ctx.migrator.migrate().unwrap();

    assert_eq!(result.applied_migrations().len(), 2);
    assert_eq!(ctx.history_count(), 2);
    assert_eq!(ctx.marker_versions(), vec!["0.0.1", "0.0.2"]);
}

#[test]
fn test_single_migration_scope_failing_rollback_keeps_history() {
    // a downgrade whose `down` body fails: the unit's ledger delete must
    // roll back with it, leaving the record in place
    let failing_down = docshift::migration::FnMigration::builder("0.0.2", "bad down")
        .up(|_, _| Ok(()))
        .down(|_, _| {
            Err(docshift::DocshiftError::new(
                "down exploded",
                ErrorKind::MigrationError,
            ))
        })
        .build()
        .unwrap();

    let ctx = context_with(
        catalog_of(vec![marker_unit("0.0.1"), failing_down]),
        TransactionScope::SingleMigration,
    )
    .unwrap();

    ctx.migrator.migrate().unwrap();
    assert_eq!(ctx.history_count(), 2);

    let err = ctx
        .migrator
        .migrate_to(Some(VersionId::new(0, 0, 1)))
        .unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::MigrationError);
    assert_eq!(ctx.history_count(), 2);
}

// ==================== TransactionScope::AllMigrations ====================

#[test]
fn test_all_migrations_scope_rolls_back_everything_on_failure() {
    let ctx = context_with(mixed_catalog(), TransactionScope::AllMigrations).unwrap();

    let err = ctx.migrator.migrate().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::MigrationError);

    // zero history records and zero body side effects remain
    assert_eq!(ctx.history_count(), 0);
    assert!(ctx.marker_versions().is_empty());
}

#[test]
fn test_all_migrations_scope_commits_everything_on_success() {
    let ctx = context_with(
        catalog_of(vec![
            marker_unit("0.0.1"),
            marker_unit("0.0.2"),
            marker_unit("0.0.3"),
        ]),
        TransactionScope::AllMigrations,
    )
    .unwrap();

    let result = ctx.migrator.migrate().unwrap();

    assert_eq!(result.final_version(), Some(VersionId::new(0, 0, 3)));
    assert_eq!(ctx.history_count(), 3);
    assert_eq!(ctx.marker_versions(), vec!["0.0.1", "0.0.2", "0.0.3"]);
}

#[test]
fn test_all_migrations_scope_failed_run_can_be_retried() {
    let ctx = context_with(mixed_catalog(), TransactionScope::AllMigrations).unwrap();
    ctx.migrator.migrate().unwrap_err();

    // the database is untouched, so a catalog without the broken unit
    // migrates cleanly through a second migrator over the same database
    let retry = docshift::Migrator::builder()
        .client(ctx.client.clone())
        .catalog(catalog_of(vec![marker_unit("0.0.1")]))
        .database_name(&ctx.db_name)
        .transaction_scope(TransactionScope::AllMigrations)
        .build()
        .unwrap();

    let result = retry.migrate().unwrap();
    assert_eq!(result.final_version(), Some(VersionId::new(0, 0, 1)));
}

#[test]
fn test_all_migrations_rollback_direction_is_atomic_too() {
    let tracker = new_tracker();
    let units = vec![
        tracked_unit("0.0.1", tracker.clone()),
        tracked_unit("0.0.2", tracker.clone()),
    ];
    let ctx = context_with(catalog_of(units), TransactionScope::AllMigrations).unwrap();

    ctx.migrator.migrate().unwrap();
    ctx.migrator.migrate_to(Some(VersionId::ZERO)).unwrap();

    assert_eq!(ctx.history_count(), 0);
    assert!(ctx.marker_versions().is_empty());
    assert_eq!(
        tracked_calls(&tracker),
        vec!["up 0.0.1", "up 0.0.2", "down 0.0.2", "down 0.0.1"]
    );
}

// ==================== Cancellation Tests ====================

#[test]
fn test_pre_cancelled_token_stops_before_any_work() {
    let ctx = context_with(
        catalog_of(vec![marker_unit("0.0.1")]),
        TransactionScope::None,
    )
    .unwrap();

    let token = CancellationToken::new();
    token.cancel();

    let err = ctx.migrator.migrate_with(None, &token).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Cancelled);
    assert_eq!(ctx.history_count(), 0);

    // the lock was never taken, so a later run proceeds normally
    let result = ctx.migrator.migrate().unwrap();
    assert_eq!(result.applied_migrations().len(), 1);
}

#[test]
fn test_mid_run_cancellation_keeps_committed_work() {
    // the first unit cancels the shared token from inside its own body; the
    // checkpoint before the second unit then stops the run
    let token = CancellationToken::new();
    let cancelling = {
        let token = token.clone();
        docshift::migration::FnMigration::builder("0.0.1", "cancels the run")
            .up(move |_, _| {
                token.cancel();
                Ok(())
            })
            .down(|_, _| Ok(()))
            .build()
            .unwrap()
    };

    let ctx = context_with(
        catalog_of(vec![cancelling, marker_unit("0.0.2")]),
        TransactionScope::None,
    )
    .unwrap();

    let err = ctx.migrator.migrate_with(None, &token).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Cancelled);

    // cancellation is not a rollback signal: the first unit stays applied
    assert_eq!(ctx.history_count(), 1);
    assert!(ctx.marker_versions().is_empty());

    // and the lock is back; finishing the run later works
    let token = CancellationToken::new();
    let result = ctx.migrator.migrate_with(None, &token).unwrap();
    assert_eq!(result.applied_versions(), vec![VersionId::new(0, 0, 2)]);
}

#[test]
fn test_cancellation_under_all_migrations_aborts_batch() {
    let token = CancellationToken::new();
    let cancelling = {
        let token = token.clone();
        docshift::migration::FnMigration::builder("0.0.1", "cancels the run")
            .up(move |db, ctx| {
                db.collection(docshift_int_test::test_util::MARKER_COLLECTION)?
                    .insert_one(docshift::doc! { version: "0.0.1" }, ctx)?;
                token.cancel();
                Ok(())
            })
            .down(|_, _| Ok(()))
            .build()
            .unwrap()
    };

    let ctx = context_with(
        catalog_of(vec![cancelling, marker_unit("0.0.2")]),
        TransactionScope::AllMigrations,
    )
    .unwrap();

    let err = ctx.migrator.migrate_with(None, &token).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Cancelled);

    // the shared transaction aborted, so even the first unit left nothing
    assert_eq!(ctx.history_count(), 0);
    assert!(ctx.marker_versions().is_empty());
}
