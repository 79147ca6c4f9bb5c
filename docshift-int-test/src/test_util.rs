use docshift::catalog::{MigrationCatalog, RegistryCatalog};
use docshift::doc;
use docshift::errors::{DocshiftError, DocshiftResult, ErrorKind};
use docshift::migration::{FnMigration, MigrationUnit};
use docshift::store::memory::InMemoryClient;
use docshift::store::{Database, Filter, StoreClientProvider};
use docshift::{MigrationOptions, Migrator, TransactionScope};
use std::sync::{Arc, Mutex};

/// Collection migration bodies write their side-effect markers into.
pub const MARKER_COLLECTION: &str = "applied_markers";

/// A shared call-order tracker for migrations built with [`tracked_unit`].
pub type CallTracker = Arc<Mutex<Vec<String>>>;

pub fn new_tracker() -> CallTracker {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn tracked_calls(tracker: &CallTracker) -> Vec<String> {
    tracker.lock().unwrap().clone()
}

/// A unique database name per test so tests sharing a client cannot collide.
pub fn random_db_name() -> String {
    format!("testdb_{}", uuid::Uuid::new_v4().simple())
}

/// A migration whose `up` inserts a marker document for its version (through
/// the execution context, so it participates in transactions) and whose
/// `down` deletes it again.
pub fn marker_unit(version: &str) -> MigrationUnit {
    let up_version = version.to_string();
    let down_version = version.to_string();
    FnMigration::builder(version, &format!("marker {}", version))
        .up(move |db, ctx| {
            db.collection(MARKER_COLLECTION)?
                .insert_one(doc! { version: up_version.as_str() }, ctx)
        })
        .down(move |db, ctx| {
            db.collection(MARKER_COLLECTION)?
                .delete_matching(&Filter::by("version", down_version.as_str()), ctx)?;
            Ok(())
        })
        .build()
        .expect("marker unit must build")
}

/// A marker unit that also records each `up`/`down` call into a tracker.
pub fn tracked_unit(version: &str, tracker: CallTracker) -> MigrationUnit {
    let up_tracker = tracker.clone();
    let up_version = version.to_string();
    let down_version = version.to_string();
    FnMigration::builder(version, &format!("tracked {}", version))
        .up(move |db, ctx| {
            up_tracker.lock().unwrap().push(format!("up {}", up_version));
            db.collection(MARKER_COLLECTION)?
                .insert_one(doc! { version: up_version.as_str() }, ctx)
        })
        .down(move |db, ctx| {
            tracker
                .lock()
                .unwrap()
                .push(format!("down {}", down_version));
            db.collection(MARKER_COLLECTION)?
                .delete_matching(&Filter::by("version", down_version.as_str()), ctx)?;
            Ok(())
        })
        .build()
        .expect("tracked unit must build")
}

/// A marker unit whose `up` fails after performing its body write, so tests
/// can observe what each transaction scope does with the partial effect.
pub fn failing_up_unit(version: &str) -> MigrationUnit {
    let up_version = version.to_string();
    FnMigration::builder(version, &format!("failing {}", version))
        .up(move |db, ctx| {
            db.collection(MARKER_COLLECTION)?
                .insert_one(doc! { version: up_version.as_str() }, ctx)?;
            Err(DocshiftError::new(
                &format!("migration {} exploded", up_version),
                ErrorKind::MigrationError,
            ))
        })
        .down(|_, _| Ok(()))
        .build()
        .expect("failing unit must build")
}

/// Builds a registry catalog from the given units.
pub fn catalog_of(units: Vec<MigrationUnit>) -> RegistryCatalog {
    let mut catalog = RegistryCatalog::new();
    for unit in units {
        catalog.register(unit).expect("unique versions in fixture");
    }
    catalog
}

/// One test's world: a private client and database name plus the migrator
/// wired over them.
pub struct TestContext {
    pub client: InMemoryClient,
    pub db_name: String,
    pub migrator: Migrator,
}

impl TestContext {
    pub fn database(&self) -> Database {
        self.client
            .database(&self.db_name)
            .expect("database must open")
    }

    pub fn history_count(&self) -> u64 {
        self.database()
            .collection("_migrations")
            .expect("history collection must open")
            .count()
            .expect("count must succeed")
    }

    pub fn marker_versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self
            .database()
            .collection(MARKER_COLLECTION)
            .expect("marker collection must open")
            .find_all()
            .expect("find_all must succeed")
            .iter()
            .map(|doc| doc.get_text("version").expect("marker version").to_string())
            .collect();
        versions.sort();
        versions
    }
}

/// Builds a context with a fresh client and the given catalog and scope.
pub fn context_with(
    catalog: impl MigrationCatalog + 'static,
    scope: TransactionScope,
) -> DocshiftResult<TestContext> {
    let client = InMemoryClient::new();
    let db_name = random_db_name();
    let options =
        MigrationOptions::new(&db_name)?.with_transaction_scope(scope);
    let migrator = Migrator::builder()
        .client(client.clone())
        .catalog(catalog)
        .options(options)
        .build()?;
    Ok(TestContext {
        client,
        db_name,
        migrator,
    })
}

/// Shorthand: marker units for each version under the given scope.
pub fn context_with_markers(
    versions: &[&str],
    scope: TransactionScope,
) -> DocshiftResult<TestContext> {
    let units = versions.iter().map(|v| marker_unit(v)).collect();
    context_with(catalog_of(units), scope)
}
