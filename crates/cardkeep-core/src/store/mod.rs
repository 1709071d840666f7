//! Storage abstraction for Cardkeep.
//!
//! The [`ContactStore`] trait defines the single-table record store the
//! capture pipeline and the presentation surfaces talk to, so the SQLite
//! backend can be replaced by [`memory::InMemoryStore`] in tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ContactRecord, NewContact};

/// Durable storage of [`ContactRecord`] values.
///
/// Every operation is atomic on its own. Failures propagate unchanged; the
/// store never retries.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`initialize`](ContactStore::initialize) | Create or upgrade the schema (idempotent) |
/// | [`create`](ContactStore::create) | Insert a record, returning its new id |
/// | [`update`](ContactStore::update) | Overwrite the mutable fields of a record |
/// | [`list_all`](ContactStore::list_all) | Every record, newest first |
/// | [`get`](ContactStore::get) | One record by id |
/// | [`exists_by_name`](ContactStore::exists_by_name) | Exact, case-sensitive name check |
/// | [`delete`](ContactStore::delete) | Remove a record by id |
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Ensure the backing schema exists and is current. Safe on every start.
    async fn initialize(&self) -> Result<()>;

    /// Insert a record. Fails if `name` is blank.
    ///
    /// `created_at` is set by the store. Returns the assigned id.
    async fn create(&self, contact: &NewContact) -> Result<i64>;

    /// Overwrite name, title, company, phones, email, address, website, and
    /// rotation of the record with `contact.id`.
    ///
    /// `image_data` and `created_at` are never touched. Returns `false`
    /// when no record has that id. Fails if `name` is blank.
    async fn update(&self, contact: &ContactRecord) -> Result<bool>;

    /// All records ordered by `created_at` descending. Empty, not an error,
    /// when there are none.
    async fn list_all(&self) -> Result<Vec<ContactRecord>>;

    async fn get(&self, id: i64) -> Result<Option<ContactRecord>>;

    /// Whether at least one record has exactly this name.
    ///
    /// A duplicate signal only: several records may share a name.
    async fn exists_by_name(&self, name: &str) -> Result<bool>;

    /// Remove the record with `id`. Returns `false` (not an error) when
    /// there was nothing to remove.
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// Shared name check for [`ContactStore::create`] and [`ContactStore::update`].
pub fn ensure_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("contact name must not be empty");
    }
    Ok(())
}
