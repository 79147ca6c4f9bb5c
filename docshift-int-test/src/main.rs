use docshift::catalog::RegistryCatalog;
use docshift::doc;
use docshift::errors::DocshiftResult;
use docshift::migration::FnMigration;
use docshift::store::memory::InMemoryClient;
use docshift::{Migrator, VersionId};

fn main() -> DocshiftResult<()> {
    colog::init();
    println!("Starting migration stress run...");

    let count: u32 = 2000;
    let mut catalog = RegistryCatalog::new();
    for i in 1..=count {
        let unit = FnMigration::builder_at(VersionId::new(0, i / 1000, i % 1000), "stress step")
            .up(move |db, ctx| {
                db.collection("stress")?
                    .insert_one(doc! { step: i as i64 }, ctx)
            })
            .down(move |db, ctx| {
                db.collection("stress")?.delete_matching(
                    &docshift::store::Filter::by("step", i as i64),
                    ctx,
                )?;
                Ok(())
            })
            .build()?;
        catalog.register(unit)?;
    }

    let migrator = Migrator::builder()
        .client(InMemoryClient::new())
        .catalog(catalog)
        .database_name("stressdb")
        .build()?;

    let start = std::time::Instant::now();
    let result = migrator.migrate()?;
    println!(
        "Applied {} migrations in {:?}, now at {}",
        result.applied_migrations().len(),
        start.elapsed(),
        result
            .final_version()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "no version".to_string())
    );

    let start = std::time::Instant::now();
    let result = migrator.migrate_to(Some(VersionId::new(0, 1, 0)))?;
    println!(
        "Rolled back {} migrations in {:?}, now at {}",
        result.applied_migrations().len(),
        start.elapsed(),
        result
            .final_version()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "no version".to_string())
    );

    Ok(())
}
