//! # Docshift - Document Database Migration Runner
//!
//! Docshift is a versioned schema/data migration runner for document databases.
//! It discovers a set of versioned migration units through a pluggable catalog,
//! determines which are applicable relative to the persisted current version,
//! and applies them in order - upgrading or rolling back - with configurable
//! transactional guarantees and protection against concurrent runs.
//!
//! ## Key Features
//!
//! - **Versioned migrations**: Every migration unit carries a totally-ordered
//!   `major.minor.patch` version that defines its place in the sequence
//! - **Bidirectional**: Each unit supplies a forward (`up`) and backward
//!   (`down`) operation against the target database
//! - **History ledger**: A history collection is both the current-version
//!   oracle and the audit log of applied migrations
//! - **Distributed locking**: A storage-backed lock serializes concurrent
//!   migration runs from independent processes
//! - **Transaction scopes**: Apply migrations with no transaction, one
//!   transaction per migration, or a single transaction for the whole batch
//! - **Cooperative cancellation**: Long runs can be cancelled at every
//!   storage boundary without rolling back committed work
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docshift::catalog::RegistryCatalog;
//! use docshift::migration::FnMigration;
//! use docshift::migrator::Migrator;
//! use docshift::store::memory::InMemoryClient;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut catalog = RegistryCatalog::new();
//! catalog.register(
//!     FnMigration::builder("0.0.1", "create inventory")
//!         .up(|db, ctx| {
//!             let inventory = db.collection("inventory")?;
//!             inventory.insert_one(docshift::doc! { name: "widget" }, ctx)
//!         })
//!         .down(|db, _ctx| db.drop_collection("inventory"))
//!         .build()?,
//! )?;
//!
//! let migrator = Migrator::builder()
//!     .client(InMemoryClient::new())
//!     .catalog(catalog)
//!     .database_name("warehouse")
//!     .build()?;
//!
//! let result = migrator.migrate()?;
//! println!("now at {:?}", result.final_version());
//! # Ok(())
//! # }
//! ```
//!
//! ## Design Pattern
//!
//! Docshift uses the **PIMPL (Pointer To IMPLementation)** design pattern:
//! public handle types wrap an `Arc` of their implementation, so clones are
//! cheap, state is shared, and the public interface stays stable while the
//! internals evolve.
//!
//! ## Module Organization
//!
//! - [`catalog`] - Migration discovery: registry, composite and filtered catalogs
//! - [`common`] - Version identifiers, cancellation, shared utilities
//! - [`errors`] - Error types and result definitions
//! - [`ledger`] - Migration-history ledger and history records
//! - [`lock`] - Distributed lock serializing concurrent runs
//! - [`migration`] - Migration unit trait and closure-backed units
//! - [`migration_options`] - Runner configuration
//! - [`migration_result`] - Per-run result summary
//! - [`migrator`] - The orchestration core
//! - [`migrator_builder`] - Fluent migrator construction
//! - [`store`] - Storage abstraction and the in-memory backend

pub mod catalog;
pub mod common;
pub mod errors;
pub mod ledger;
pub mod lock;
pub mod migration;
pub mod migration_options;
pub mod migration_result;
pub mod migrator;
pub mod migrator_builder;
pub mod store;

pub use common::{CancellationToken, VersionId};
pub use errors::{DocshiftError, DocshiftResult, ErrorKind};
pub use migration_options::{MigrationOptions, ParallelRunsBehavior, TransactionScope};
pub use migration_result::MigrationResult;
pub use migrator::Migrator;

pub const DOCSHIFT_VERSION: &str = env!("CARGO_PKG_VERSION");
