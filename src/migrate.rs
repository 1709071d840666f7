//! Versioned schema migrations for the `contacts` table.
//!
//! The schema version lives in SQLite's `PRAGMA user_version`. Each numbered
//! migration is additive and runs only when the stored version is lower.
//! Column additions check `pragma_table_info` first, so a database created
//! by an older build (columns already present, version still 0) upgrades
//! cleanly. All pending migrations share one transaction.

use anyhow::{bail, Context, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::config::Config;
use crate::db;

pub const CURRENT_SCHEMA_VERSION: i64 = 3;

/// Open the configured database and bring it to [`CURRENT_SCHEMA_VERSION`].
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = migrate_pool(&pool).await;
    pool.close().await;
    result
}

pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    let mut version = schema_version(pool).await?;

    if version > CURRENT_SCHEMA_VERSION {
        bail!(
            "database version ({}) is newer than supported schema ({})",
            version,
            CURRENT_SCHEMA_VERSION
        );
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let mut tx = pool
        .begin()
        .await
        .context("failed to open migration transaction")?;

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        apply_migration(&mut tx, next)
            .await
            .with_context(|| format!("migration to version {next} failed"))?;
        info!(version = next, "applied schema migration");
        version = next;
    }

    sqlx::query(&format!("PRAGMA user_version = {CURRENT_SCHEMA_VERSION}"))
        .execute(&mut *tx)
        .await
        .context("failed to update user_version pragma")?;
    tx.commit().await.context("failed to commit migrations")?;

    Ok(())
}

pub async fn schema_version(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .context("failed to read user_version pragma")
}

async fn apply_migration(tx: &mut Transaction<'_, Sqlite>, version: i64) -> Result<()> {
    match version {
        1 => {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS contacts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    title TEXT,
                    company TEXT,
                    phone TEXT,
                    email TEXT,
                    address TEXT,
                    website TEXT,
                    image_data TEXT,
                    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                )
                "#,
            )
            .execute(&mut **tx)
            .await?;
            sqlx::query(
                "CREATE INDEX IF NOT EXISTS idx_contacts_created_at ON contacts(created_at DESC)",
            )
            .execute(&mut **tx)
            .await?;
            sqlx::query("CREATE INDEX IF NOT EXISTS idx_contacts_name ON contacts(name)")
                .execute(&mut **tx)
                .await?;
        }
        2 => {
            add_column(tx, "suggested_rotation", "INTEGER DEFAULT 0").await?;
        }
        3 => {
            add_column(tx, "mobile_phone", "TEXT DEFAULT ''").await?;
        }
        other => bail!("no migration defined for version {other}"),
    }
    Ok(())
}

async fn add_column(
    tx: &mut Transaction<'_, Sqlite>,
    column: &str,
    definition: &str,
) -> Result<()> {
    if column_exists(tx, column).await? {
        return Ok(());
    }
    sqlx::query(&format!(
        "ALTER TABLE contacts ADD COLUMN {column} {definition}"
    ))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn column_exists(tx: &mut Transaction<'_, Sqlite>, column: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('contacts') WHERE name = ?",
    )
    .bind(column)
    .fetch_one(&mut **tx)
    .await?;
    Ok(exists)
}
