use crate::common::VersionId;
use crate::errors::{DocshiftError, DocshiftResult, ErrorKind};
use crate::store::{Database, ExecutionContext};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A versioned, named pair of forward/backward operations.
///
/// The version is the unit's identity: it must be unique within a catalog and
/// defines the unit's place in the migration sequence. The name is a
/// human-readable label carried into the history ledger; it must never be
/// empty and is always supplied explicitly at construction.
///
/// Operations receive the target [`Database`] and the [`ExecutionContext`]
/// chosen by the migrator's transaction scope; a body that writes through the
/// context participates in whatever transaction the scope set up.
pub trait MigrationUnitProvider: Send + Sync {
    fn version(&self) -> VersionId;

    fn name(&self) -> String;

    /// Applies the migration's forward operation.
    fn up(&self, database: &Database, ctx: &ExecutionContext) -> DocshiftResult<()>;

    /// Applies the migration's backward operation.
    fn down(&self, database: &Database, ctx: &ExecutionContext) -> DocshiftResult<()>;
}

/// Cloneable handle over a [`MigrationUnitProvider`].
#[derive(Clone)]
pub struct MigrationUnit {
    inner: Arc<dyn MigrationUnitProvider>,
}

impl MigrationUnit {
    pub fn new(provider: impl MigrationUnitProvider + 'static) -> Self {
        MigrationUnit {
            inner: Arc::new(provider),
        }
    }

    pub fn version(&self) -> VersionId {
        self.inner.version()
    }

    pub fn name(&self) -> String {
        self.inner.name()
    }

    pub fn up(&self, database: &Database, ctx: &ExecutionContext) -> DocshiftResult<()> {
        self.inner.up(database, ctx)
    }

    pub fn down(&self, database: &Database, ctx: &ExecutionContext) -> DocshiftResult<()> {
        self.inner.down(database, ctx)
    }
}

impl Debug for MigrationUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MigrationUnit({} '{}')", self.version(), self.name())
    }
}

type MigrationFn = dyn Fn(&Database, &ExecutionContext) -> DocshiftResult<()> + Send + Sync;

/// A closure-backed migration unit.
///
/// Dependencies a body needs (handles, configuration, fixtures) are captured
/// by its closures at registration time; the migrator only ever sees the
/// finished unit.
///
/// ```ignore
/// let unit = FnMigration::builder("0.0.1", "create inventory")
///     .up(|db, ctx| {
///         db.collection("inventory")?.insert_one(doc! { seeded: true }, ctx)
///     })
///     .down(|db, _ctx| db.drop_collection("inventory"))
///     .build()?;
/// ```
pub struct FnMigration {
    version: VersionId,
    name: String,
    up: Option<Arc<MigrationFn>>,
    down: Option<Arc<MigrationFn>>,
}

impl FnMigration {
    /// Starts a builder from a version string and an explicit name.
    pub fn builder(version: &str, name: &str) -> FnMigrationBuilder {
        let mut builder = FnMigrationBuilder {
            error: None,
            version: None,
            name: name.to_string(),
            up: None,
            down: None,
        };
        match VersionId::parse(version) {
            Ok(v) => builder.version = Some(v),
            Err(e) => builder.error = Some(e),
        }
        builder
    }

    /// Starts a builder from an already-constructed version.
    pub fn builder_at(version: VersionId, name: &str) -> FnMigrationBuilder {
        FnMigrationBuilder {
            error: None,
            version: Some(version),
            name: name.to_string(),
            up: None,
            down: None,
        }
    }
}

impl MigrationUnitProvider for FnMigration {
    fn version(&self) -> VersionId {
        self.version
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn up(&self, database: &Database, ctx: &ExecutionContext) -> DocshiftResult<()> {
        match &self.up {
            Some(body) => body(database, ctx),
            None => Err(DocshiftError::new(
                &format!("Migration {} '{}' has no forward operation", self.version, self.name),
                ErrorKind::InvalidOperation,
            )),
        }
    }

    fn down(&self, database: &Database, ctx: &ExecutionContext) -> DocshiftResult<()> {
        match &self.down {
            Some(body) => body(database, ctx),
            None => Err(DocshiftError::new(
                &format!("Migration {} '{}' has no backward operation", self.version, self.name),
                ErrorKind::InvalidOperation,
            )),
        }
    }
}

/// Builder for [`FnMigration`].
///
/// Configuration errors (a malformed version, a blank name) are captured and
/// surfaced by `build()`, so registration code can stay fluent.
pub struct FnMigrationBuilder {
    error: Option<DocshiftError>,
    version: Option<VersionId>,
    name: String,
    up: Option<Arc<MigrationFn>>,
    down: Option<Arc<MigrationFn>>,
}

impl FnMigrationBuilder {
    /// Sets the forward operation.
    pub fn up(
        mut self,
        body: impl Fn(&Database, &ExecutionContext) -> DocshiftResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.up = Some(Arc::new(body));
        self
    }

    /// Sets the backward operation.
    pub fn down(
        mut self,
        body: impl Fn(&Database, &ExecutionContext) -> DocshiftResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.down = Some(Arc::new(body));
        self
    }

    /// Finalizes the unit.
    ///
    /// # Returns
    /// * `Err` with the captured parse error if the version was malformed
    /// * `Err` with kind `ValidationError` if the name is blank
    pub fn build(self) -> DocshiftResult<MigrationUnit> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let version = self.version.ok_or_else(|| {
            DocshiftError::new("Migration version is required", ErrorKind::ValidationError)
        })?;

        if self.name.trim().is_empty() {
            return Err(DocshiftError::new(
                &format!("Migration {} must have a non-empty name", version),
                ErrorKind::ValidationError,
            ));
        }

        Ok(MigrationUnit::new(FnMigration {
            version,
            name: self.name,
            up: self.up,
            down: self.down,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryClient;
    use crate::store::StoreClientProvider;

    fn test_database() -> Database {
        InMemoryClient::new().database("testdb").unwrap()
    }

    #[test]
    fn test_builder_creates_unit() {
        let unit = FnMigration::builder("0.0.1", "first")
            .up(|_, _| Ok(()))
            .down(|_, _| Ok(()))
            .build()
            .unwrap();

        assert_eq!(unit.version(), VersionId::new(0, 0, 1));
        assert_eq!(unit.name(), "first");
    }

    #[test]
    fn test_builder_at_takes_version_value() {
        let unit = FnMigration::builder_at(VersionId::new(1, 2, 3), "typed")
            .build()
            .unwrap();
        assert_eq!(unit.version(), VersionId::new(1, 2, 3));
    }

    #[test]
    fn test_builder_captures_version_parse_error() {
        let err = FnMigration::builder("not-a-version", "x")
            .up(|_, _| Ok(()))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidVersionFormat);
    }

    #[test]
    fn test_builder_rejects_blank_name() {
        let err = FnMigration::builder("0.0.1", "   ").build().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_up_runs_body() {
        let unit = FnMigration::builder("0.0.1", "writes")
            .up(|db, ctx| {
                db.collection("data")?
                    .insert_one(crate::doc! { seeded: true }, ctx)
            })
            .build()
            .unwrap();

        let db = test_database();
        unit.up(&db, &ExecutionContext::NoTransaction).unwrap();
        assert_eq!(db.collection("data").unwrap().count().unwrap(), 1);
    }

    #[test]
    fn test_missing_direction_fails_at_apply_time() {
        let unit = FnMigration::builder("0.0.1", "one way")
            .up(|_, _| Ok(()))
            .build()
            .unwrap();

        let db = test_database();
        assert!(unit.up(&db, &ExecutionContext::NoTransaction).is_ok());
        let err = unit.down(&db, &ExecutionContext::NoTransaction).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_body_error_propagates() {
        let unit = FnMigration::builder("0.0.1", "fails")
            .up(|_, _| {
                Err(DocshiftError::new(
                    "body exploded",
                    ErrorKind::MigrationError,
                ))
            })
            .build()
            .unwrap();

        let db = test_database();
        let err = unit.up(&db, &ExecutionContext::NoTransaction).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MigrationError);
        assert_eq!(err.message(), "body exploded");
    }
}
