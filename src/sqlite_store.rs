//! SQLite-backed [`ContactStore`] implementation.
//!
//! Maps each store operation to one SQL statement against the `contacts`
//! table created by [`crate::migrate`].

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use cardkeep_core::models::{ContactRecord, NewContact, Rotation};
use cardkeep_core::store::{ensure_name, ContactStore};

use crate::config::Config;
use crate::db;
use crate::migrate;

/// Timestamps are written as UTC text with millisecond precision. Rows
/// written by `CURRENT_TIMESTAMP` (second precision) parse with the same
/// format and sort correctly against them.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const SELECT_COLUMNS: &str = "id, name, title, company, phone, mobile_phone, email, address, \
     website, image_data, suggested_rotation, created_at";

/// SQLite implementation of the [`ContactStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database file (created if missing).
    pub async fn connect(config: &Config) -> Result<Self> {
        Ok(Self::new(db::connect(config).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)))
        .map_err(|err| anyhow!("invalid created_at '{raw}': {err}"))
}

fn text(row: &SqliteRow, column: &str) -> Result<String> {
    Ok(row
        .try_get::<Option<String>, _>(column)?
        .unwrap_or_default())
}

fn row_to_record(row: &SqliteRow) -> Result<ContactRecord> {
    let created_at: String = row.try_get("created_at")?;
    let rotation: Option<i64> = row.try_get("suggested_rotation")?;

    Ok(ContactRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        title: text(row, "title")?,
        company: text(row, "company")?,
        phone: text(row, "phone")?,
        mobile_phone: text(row, "mobile_phone")?,
        email: text(row, "email")?,
        address: text(row, "address")?,
        website: text(row, "website")?,
        image_data: row.try_get("image_data")?,
        suggested_rotation: Rotation::from_degrees(rotation.unwrap_or(0)),
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait]
impl ContactStore for SqliteStore {
    async fn initialize(&self) -> Result<()> {
        migrate::migrate_pool(&self.pool).await
    }

    async fn create(&self, contact: &NewContact) -> Result<i64> {
        ensure_name(&contact.name)?;
        let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();

        let result = sqlx::query(
            r#"
            INSERT INTO contacts (name, title, company, phone, mobile_phone, email,
                                  address, website, image_data, suggested_rotation,
                                  created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&contact.name)
        .bind(&contact.title)
        .bind(&contact.company)
        .bind(&contact.phone)
        .bind(&contact.mobile_phone)
        .bind(&contact.email)
        .bind(&contact.address)
        .bind(&contact.website)
        .bind(&contact.image_data)
        .bind(i64::from(contact.suggested_rotation))
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("failed to insert contact")?;

        Ok(result.last_insert_rowid())
    }

    async fn update(&self, contact: &ContactRecord) -> Result<bool> {
        ensure_name(&contact.name)?;

        let result = sqlx::query(
            r#"
            UPDATE contacts
            SET name = ?, title = ?, company = ?, phone = ?, mobile_phone = ?,
                email = ?, address = ?, website = ?, suggested_rotation = ?
            WHERE id = ?
            "#,
        )
        .bind(&contact.name)
        .bind(&contact.title)
        .bind(&contact.company)
        .bind(&contact.phone)
        .bind(&contact.mobile_phone)
        .bind(&contact.email)
        .bind(&contact.address)
        .bind(&contact.website)
        .bind(i64::from(contact.suggested_rotation))
        .bind(contact.id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update contact {}", contact.id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> Result<Vec<ContactRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM contacts ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .context("failed to list contacts")?;

        rows.iter().map(row_to_record).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<ContactRecord>> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM contacts WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load contact {id}"))?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn exists_by_name(&self, name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM contacts WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .context("failed to check for duplicate contact")?;
        Ok(exists)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete contact {id}"))?;
        Ok(result.rows_affected() > 0)
    }
}
