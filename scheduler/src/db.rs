use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use reproducible_common::errors::*;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Open the database and bring its schema up to date.
pub fn setup(url: &str) -> Result<SqliteConnection> {
    let mut connection = SqliteConnection::establish(url)
        .with_context(|| anyhow!("Failed to open database: {:?}", url))?;
    connection.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 10000;")?;

    let applied = connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(|err| anyhow!("Failed to run migrations: {:#}", err))?;
    for migration in applied {
        info!("Applied database migration: {}", migration);
    }

    Ok(connection)
}
