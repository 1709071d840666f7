//! In-memory [`ContactStore`] implementation for tests.
//!
//! Records live in a `BTreeMap` behind `std::sync::RwLock`. Ids come from a
//! counter that only moves forward, so deleted ids are never handed out
//! again.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{ContactRecord, NewContact};

use super::{ensure_name, ContactStore};

#[derive(Default)]
struct Inner {
    records: BTreeMap<i64, ContactRecord>,
    last_id: i64,
}

/// In-memory store for tests.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    creates: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            creates: AtomicUsize::new(0),
        }
    }

    /// Number of successful [`ContactStore::create`] calls so far.
    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl ContactStore for InMemoryStore {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn create(&self, contact: &NewContact) -> Result<i64> {
        ensure_name(&contact.name)?;
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.last_id += 1;
        let id = inner.last_id;
        inner
            .records
            .insert(id, contact.clone().into_record(id, Utc::now()));
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn update(&self, contact: &ContactRecord) -> Result<bool> {
        ensure_name(&contact.name)?;
        let mut inner = self.inner.write().map_err(poisoned)?;
        let Some(stored) = inner.records.get_mut(&contact.id) else {
            return Ok(false);
        };
        *stored = ContactRecord {
            image_data: stored.image_data.take(),
            created_at: stored.created_at,
            ..contact.clone()
        };
        Ok(true)
    }

    async fn list_all(&self) -> Result<Vec<ContactRecord>> {
        let inner = self.inner.read().map_err(poisoned)?;
        let mut records: Vec<ContactRecord> = inner.records.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn get(&self, id: i64) -> Result<Option<ContactRecord>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.records.get(&id).cloned())
    }

    async fn exists_by_name(&self, name: &str) -> Result<bool> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.records.values().any(|r| r.name == name))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        Ok(inner.records.remove(&id).is_some())
    }
}
