//! Migration discovery.
//!
//! A catalog produces the full, ordered, duplicate-free sequence of migration
//! units the migrator plans from. Discovery is explicit: hosts register
//! already-constructed units (or factory closures) rather than relying on any
//! runtime scanning. Three shapes cover the usual arrangements:
//!
//! - [`RegistryCatalog`] - an explicit list built at startup
//! - [`CompositeCatalog`] - several catalogs merged (one per module/feature)
//! - [`FilteredCatalog`] - a catalog narrowed by a predicate

use crate::errors::{DocshiftError, DocshiftResult, ErrorKind};
use crate::migration::MigrationUnit;
use indexmap::IndexSet;
use itertools::Itertools;
use std::sync::Arc;

/// Produces the ordered, duplicate-free migration sequence.
///
/// `locate()` returns units sorted ascending by version. Two units with the
/// same version are a `DuplicateVersion` error raised here, by the catalog -
/// the migrator never sees the malformed sequence. A factory that fails to
/// produce its unit is an `InstantiationError` wrapping the cause.
pub trait MigrationCatalog: Send + Sync {
    fn locate(&self) -> DocshiftResult<Vec<MigrationUnit>>;
}

type MigrationFactory = Arc<dyn Fn() -> DocshiftResult<MigrationUnit> + Send + Sync>;

enum Registration {
    Unit(MigrationUnit),
    Factory {
        label: String,
        factory: MigrationFactory,
    },
}

/// An explicit, registration-ordered list of migrations.
///
/// Units registered directly are checked for duplicate versions immediately;
/// factory-produced versions are only known at `locate()` time and are
/// checked there.
#[derive(Default)]
pub struct RegistryCatalog {
    registrations: Vec<Registration>,
    known_versions: IndexSet<crate::common::VersionId>,
}

impl RegistryCatalog {
    pub fn new() -> Self {
        RegistryCatalog::default()
    }

    /// Registers an already-constructed unit.
    ///
    /// # Returns
    /// * `Err` with kind `DuplicateVersion` if a unit with this version was
    ///   already registered
    /// * `Err` with kind `ValidationError` if the unit's name is blank
    pub fn register(&mut self, unit: MigrationUnit) -> DocshiftResult<()> {
        check_name(&unit)?;
        if !self.known_versions.insert(unit.version()) {
            return Err(DocshiftError::new(
                &format!("Migration version {} is already registered", unit.version()),
                ErrorKind::DuplicateVersion,
            ));
        }
        self.registrations.push(Registration::Unit(unit));
        Ok(())
    }

    /// Registers a factory closure invoked at `locate()` time.
    ///
    /// The label identifies the factory in error messages when construction
    /// fails.
    pub fn register_factory(
        &mut self,
        label: &str,
        factory: impl Fn() -> DocshiftResult<MigrationUnit> + Send + Sync + 'static,
    ) {
        self.registrations.push(Registration::Factory {
            label: label.to_string(),
            factory: Arc::new(factory),
        });
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl MigrationCatalog for RegistryCatalog {
    fn locate(&self) -> DocshiftResult<Vec<MigrationUnit>> {
        let mut units = Vec::with_capacity(self.registrations.len());
        for registration in &self.registrations {
            match registration {
                Registration::Unit(unit) => units.push(unit.clone()),
                Registration::Factory { label, factory } => {
                    let unit = factory().map_err(|e| {
                        DocshiftError::new_with_cause(
                            &format!("Migration factory '{}' failed to produce a unit", label),
                            ErrorKind::InstantiationError,
                            e,
                        )
                    })?;
                    check_name(&unit)?;
                    units.push(unit);
                }
            }
        }
        finalize(units)
    }
}

/// Merges several catalogs into one sequence.
///
/// The merged sequence is re-sorted and re-checked, so a version registered
/// in two different member catalogs is a `DuplicateVersion` error.
#[derive(Default)]
pub struct CompositeCatalog {
    catalogs: Vec<Arc<dyn MigrationCatalog>>,
}

impl CompositeCatalog {
    pub fn new() -> Self {
        CompositeCatalog::default()
    }

    pub fn add(&mut self, catalog: impl MigrationCatalog + 'static) {
        self.catalogs.push(Arc::new(catalog));
    }
}

impl MigrationCatalog for CompositeCatalog {
    fn locate(&self) -> DocshiftResult<Vec<MigrationUnit>> {
        let mut units = Vec::new();
        for catalog in &self.catalogs {
            units.extend(catalog.locate()?);
        }
        finalize(units)
    }
}

/// A catalog narrowed by a unit predicate.
///
/// Filtering happens after the inner catalog's own ordering and duplicate
/// checks, so a filtered view of a valid catalog is always valid.
pub struct FilteredCatalog {
    inner: Arc<dyn MigrationCatalog>,
    predicate: Arc<dyn Fn(&MigrationUnit) -> bool + Send + Sync>,
}

impl FilteredCatalog {
    pub fn new(
        inner: impl MigrationCatalog + 'static,
        predicate: impl Fn(&MigrationUnit) -> bool + Send + Sync + 'static,
    ) -> Self {
        FilteredCatalog {
            inner: Arc::new(inner),
            predicate: Arc::new(predicate),
        }
    }
}

impl MigrationCatalog for FilteredCatalog {
    fn locate(&self) -> DocshiftResult<Vec<MigrationUnit>> {
        let units = self.inner.locate()?;
        Ok(units
            .into_iter()
            .filter(|unit| (self.predicate)(unit))
            .collect())
    }
}

fn check_name(unit: &MigrationUnit) -> DocshiftResult<()> {
    if unit.name().trim().is_empty() {
        return Err(DocshiftError::new(
            &format!("Migration {} must have a non-empty name", unit.version()),
            ErrorKind::ValidationError,
        ));
    }
    Ok(())
}

/// Sorts ascending by version and rejects duplicates.
fn finalize(units: Vec<MigrationUnit>) -> DocshiftResult<Vec<MigrationUnit>> {
    let sorted: Vec<MigrationUnit> = units
        .into_iter()
        .sorted_by_key(|unit| unit.version())
        .collect();

    if let Some((a, b)) = sorted
        .iter()
        .tuple_windows()
        .find(|(a, b)| a.version() == b.version())
    {
        return Err(DocshiftError::new(
            &format!(
                "Duplicate migration version {}: '{}' and '{}'",
                a.version(),
                a.name(),
                b.name()
            ),
            ErrorKind::DuplicateVersion,
        ));
    }

    Ok(sorted)
}
