//! Migration unit definitions.
//!
//! A migration unit is a named, versioned pair of forward/backward operations
//! against the target database. Units are defined either by implementing
//! [`MigrationUnitProvider`] on your own type or by assembling closures with
//! [`FnMigration::builder`].

mod unit;

pub use unit::{FnMigration, FnMigrationBuilder, MigrationUnit, MigrationUnitProvider};
