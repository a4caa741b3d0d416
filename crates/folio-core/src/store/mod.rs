//! Storage abstraction for folio.
//!
//! Two traits split the persisted state the way the lifecycle sees it:
//!
//! - [`EntityStore`]: the live collections, one per [`CollectionType`].
//! - [`RecycleBinStore`]: the single heterogeneous archive.
//!
//! Implementations must make every single-record operation atomic: a record
//! either exists or it doesn't, and [`RecycleBinStore::claim_entry`] must
//! succeed for at most one caller at a time. The lifecycle manager relies on
//! that instead of in-process locking.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::collection::CollectionType;
use crate::models::{Entity, RecycleBinEntry};

/// Live content collections.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_entity`](EntityStore::insert_entity) | Add a new record |
/// | [`replace_entity`](EntityStore::replace_entity) | Overwrite an existing record |
/// | [`get_entity`](EntityStore::get_entity) | Fetch a record by id |
/// | [`delete_entity`](EntityStore::delete_entity) | Remove a record |
/// | [`list_entities`](EntityStore::list_entities) | All records, sort field descending |
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert a new record into its collection. Fails if the id is taken.
    async fn insert_entity(&self, entity: &Entity) -> Result<()>;

    /// Overwrite an existing record. Returns `false` if it does not exist.
    async fn replace_entity(&self, entity: &Entity) -> Result<bool>;

    async fn get_entity(&self, collection: CollectionType, id: &str) -> Result<Option<Entity>>;

    /// Remove a record. Returns `false` if it did not exist.
    async fn delete_entity(&self, collection: CollectionType, id: &str) -> Result<bool>;

    /// All records of a collection, newest sort value first.
    async fn list_entities(&self, collection: CollectionType) -> Result<Vec<Entity>>;
}

/// The recycle-bin archive.
///
/// Restore and purge take a short-lived **claim** on an entry before doing
/// any work. A claim is a store-side marker (a caller-chosen token plus a
/// timestamp) set with a single conditional write; it is free when unset or
/// older than the caller's `stale_before` cutoff. Long operations call
/// [`renew_claim`](RecycleBinStore::renew_claim) between steps and stop as
/// soon as it reports the claim was taken over. Listing and reading ignore
/// claims.
#[async_trait]
pub trait RecycleBinStore: Send + Sync {
    async fn insert_entry(&self, entry: &RecycleBinEntry) -> Result<()>;

    async fn get_entry(&self, id: &str) -> Result<Option<RecycleBinEntry>>;

    /// All entries, most recently deleted first.
    async fn list_entries(&self) -> Result<Vec<RecycleBinEntry>>;

    /// Atomically mark the entry as held under `token` and return it.
    ///
    /// Returns `None` if the entry does not exist or holds a claim newer
    /// than `stale_before`.
    async fn claim_entry(
        &self,
        id: &str,
        token: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<RecycleBinEntry>>;

    /// Refresh the claim timestamp if the entry is still held under `token`.
    ///
    /// Returns `false` if the entry is gone or another caller has claimed it.
    async fn renew_claim(&self, id: &str, token: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Clear the claim on an entry if it is still held under `token`.
    async fn release_entry(&self, id: &str, token: &str) -> Result<()>;

    /// Remove an entry. Returns `false` if it did not exist.
    async fn delete_entry(&self, id: &str) -> Result<bool>;
}
