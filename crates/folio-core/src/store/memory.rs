//! In-memory store for tests and embedding.
//!
//! Uses `HashMap`s behind `std::sync::RwLock`. Each operation takes the lock
//! once, which gives the single-record atomicity the store traits require.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::collection::CollectionType;
use crate::models::{Entity, RecycleBinEntry};

use super::{EntityStore, RecycleBinStore};

struct Claim {
    token: String,
    at: DateTime<Utc>,
}

struct StoredEntry {
    entry: RecycleBinEntry,
    claim: Option<Claim>,
}

/// In-memory implementation of both [`EntityStore`] and [`RecycleBinStore`].
pub struct InMemoryStore {
    entities: RwLock<HashMap<CollectionType, HashMap<String, Entity>>>,
    bin: RwLock<HashMap<String, StoredEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            bin: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn insert_entity(&self, entity: &Entity) -> Result<()> {
        let mut entities = write(&self.entities)?;
        let collection = entities.entry(entity.collection_type()).or_default();
        if collection.contains_key(entity.id()) {
            bail!(
                "duplicate id {} in collection {}",
                entity.id(),
                entity.collection_type().info().collection
            );
        }
        collection.insert(entity.id().to_string(), entity.clone());
        Ok(())
    }

    async fn replace_entity(&self, entity: &Entity) -> Result<bool> {
        let mut entities = write(&self.entities)?;
        match entities
            .get_mut(&entity.collection_type())
            .and_then(|c| c.get_mut(entity.id()))
        {
            Some(slot) => {
                *slot = entity.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_entity(&self, collection: CollectionType, id: &str) -> Result<Option<Entity>> {
        let entities = read(&self.entities)?;
        Ok(entities.get(&collection).and_then(|c| c.get(id)).cloned())
    }

    async fn delete_entity(&self, collection: CollectionType, id: &str) -> Result<bool> {
        let mut entities = write(&self.entities)?;
        Ok(entities
            .get_mut(&collection)
            .map(|c| c.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn list_entities(&self, collection: CollectionType) -> Result<Vec<Entity>> {
        let entities = read(&self.entities)?;
        let mut out: Vec<Entity> = entities
            .get(&collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default();
        out.sort_by(|a, b| {
            b.sort_value()
                .cmp(&a.sort_value())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(out)
    }
}

#[async_trait]
impl RecycleBinStore for InMemoryStore {
    async fn insert_entry(&self, entry: &RecycleBinEntry) -> Result<()> {
        let mut bin = write(&self.bin)?;
        if bin.contains_key(&entry.id) {
            bail!("duplicate recycle bin entry id {}", entry.id);
        }
        bin.insert(
            entry.id.clone(),
            StoredEntry {
                entry: entry.clone(),
                claim: None,
            },
        );
        Ok(())
    }

    async fn get_entry(&self, id: &str) -> Result<Option<RecycleBinEntry>> {
        let bin = read(&self.bin)?;
        Ok(bin.get(id).map(|s| s.entry.clone()))
    }

    async fn list_entries(&self) -> Result<Vec<RecycleBinEntry>> {
        let bin = read(&self.bin)?;
        let mut out: Vec<RecycleBinEntry> = bin.values().map(|s| s.entry.clone()).collect();
        out.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn claim_entry(
        &self,
        id: &str,
        token: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<RecycleBinEntry>> {
        let mut bin = write(&self.bin)?;
        let stored = match bin.get_mut(id) {
            Some(s) => s,
            None => return Ok(None),
        };
        match &stored.claim {
            Some(claim) if claim.at >= stale_before => Ok(None),
            _ => {
                stored.claim = Some(Claim {
                    token: token.to_string(),
                    at: now,
                });
                Ok(Some(stored.entry.clone()))
            }
        }
    }

    async fn renew_claim(&self, id: &str, token: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut bin = write(&self.bin)?;
        match bin.get_mut(id).and_then(|s| s.claim.as_mut()) {
            Some(claim) if claim.token == token => {
                claim.at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_entry(&self, id: &str, token: &str) -> Result<()> {
        let mut bin = write(&self.bin)?;
        if let Some(stored) = bin.get_mut(id) {
            if stored.claim.as_ref().is_some_and(|c| c.token == token) {
                stored.claim = None;
            }
        }
        Ok(())
    }

    async fn delete_entry(&self, id: &str) -> Result<bool> {
        let mut bin = write(&self.bin)?;
        Ok(bin.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn entry(id: &str, deleted_at: DateTime<Utc>) -> RecycleBinEntry {
        RecycleBinEntry {
            id: id.to_string(),
            collection_type: "Contact".to_string(),
            item: json!({ "name": "A", "email": "a@example.com", "message": "hi" }),
            deleted_at,
            original_sort_field: "createdAt".to_string(),
            original_sort_value: json!(deleted_at),
        }
    }

    #[tokio::test]
    async fn test_entries_listed_newest_first() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.insert_entry(&entry("old", now - Duration::hours(1))).await.unwrap();
        store.insert_entry(&entry("new", now)).await.unwrap();
        let ids: Vec<String> = store
            .list_entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_until_stale() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.insert_entry(&entry("e1", now)).await.unwrap();

        let cutoff = now - Duration::minutes(5);
        assert!(store.claim_entry("e1", "a", now, cutoff).await.unwrap().is_some());
        assert!(store.claim_entry("e1", "b", now, cutoff).await.unwrap().is_none());

        // Ten minutes later the first claim is stale.
        let later = now + Duration::minutes(10);
        assert!(store
            .claim_entry("e1", "b", later, later - Duration::minutes(5))
            .await
            .unwrap()
            .is_some());
        assert!(!store.renew_claim("e1", "a", later).await.unwrap());
        assert!(store.renew_claim("e1", "b", later).await.unwrap());
    }

    #[tokio::test]
    async fn test_renew_keeps_claim_fresh() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.insert_entry(&entry("e1", now)).await.unwrap();
        store.claim_entry("e1", "a", now, now).await.unwrap();

        let later = now + Duration::minutes(4);
        assert!(store.renew_claim("e1", "a", later).await.unwrap());

        // Stale relative to the original claim, fresh relative to the renewal.
        let checked_at = now + Duration::minutes(6);
        assert!(store
            .claim_entry("e1", "b", checked_at, checked_at - Duration::minutes(5))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_release_only_by_holder() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.insert_entry(&entry("e1", now)).await.unwrap();
        let cutoff = now - Duration::minutes(5);
        store.claim_entry("e1", "a", now, cutoff).await.unwrap();

        store.release_entry("e1", "b").await.unwrap();
        assert!(store.claim_entry("e1", "b", now, cutoff).await.unwrap().is_none());

        store.release_entry("e1", "a").await.unwrap();
        assert!(store.claim_entry("e1", "b", now, cutoff).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_claim_missing_entry() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        assert!(store.claim_entry("nope", "a", now, now).await.unwrap().is_none());
        assert!(!store.renew_claim("nope", "a", now).await.unwrap());
        assert!(!store.delete_entry("nope").await.unwrap());
    }
}
