//! The recycle-bin lifecycle: soft delete, restore, and purge.
//!
//! ```text
//!            soft_delete                 restore
//!  ┌────────┐ ─────────▶ ┌─────────────┐ ─────────▶ ┌────────┐
//!  │  live  │            │ recycle bin │            │  live  │ (new id)
//!  └────────┘            └──────┬──────┘            └────────┘
//!                               │ purge
//!                               ▼
//!                     entry + hosted assets gone
//! ```
//!
//! Ordering rules:
//!
//! - soft delete writes the archive entry before removing the live record;
//! - restore inserts the new record before removing the entry;
//! - purge removes the entry only after every asset deletion was attempted.
//!
//! Restore and purge claim the entry first (see
//! [`RecycleBinStore::claim_entry`]); whichever loses a race on the same
//! entry gets [`LifecycleError::NotFound`]. Purge renews its claim before
//! every asset deletion and restore before writing the new record, so an
//! operation that outlived its claim stops instead of racing the new
//! holder. A failed restore or purge releases its claim, so the entry is
//! left untouched.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::asset::{delete_asset, hosted_public_ids, AssetDeletion, AssetStore};
use crate::collection::{strip_fields, CollectionType, IDENTITY_FIELDS};
use crate::models::{Entity, RecycleBinEntry};
use crate::store::{EntityStore, RecycleBinStore};

/// Default lifetime of a restore/purge claim.
pub const DEFAULT_CLAIM_TTL_SECS: i64 = 300;

/// Errors surfaced by lifecycle and content operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{what} not found: {id}")]
    NotFound { what: String, id: String },

    #[error("unknown collection type: {0}")]
    UnknownCollectionType(String),

    #[error("invalid {collection}: {message}")]
    Validation {
        collection: CollectionType,
        message: String,
    },

    #[error("persistence failure: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl LifecycleError {
    pub fn not_found(what: impl Into<String>, id: impl Into<String>) -> Self {
        LifecycleError::NotFound {
            what: what.into(),
            id: id.into(),
        }
    }

    pub fn validation(collection: CollectionType, message: impl Into<String>) -> Self {
        LifecycleError::Validation {
            collection,
            message: message.into(),
        }
    }
}

/// Result of a purge: which assets were attempted and how each went.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub entry_id: String,
    pub collection_type: String,
    pub assets: Vec<AssetDeletion>,
}

impl PurgeReport {
    pub fn failed_assets(&self) -> usize {
        self.assets.iter().filter(|a| !a.is_deleted()).count()
    }
}

/// Orchestrates moves between the live collections and the recycle bin.
pub struct LifecycleManager {
    entities: Arc<dyn EntityStore>,
    bin: Arc<dyn RecycleBinStore>,
    assets: Arc<dyn AssetStore>,
    claim_ttl: Duration,
}

impl LifecycleManager {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        bin: Arc<dyn RecycleBinStore>,
        assets: Arc<dyn AssetStore>,
    ) -> Self {
        Self {
            entities,
            bin,
            assets,
            claim_ttl: Duration::seconds(DEFAULT_CLAIM_TTL_SECS),
        }
    }

    /// How long a restore/purge claim blocks other operations on the entry.
    pub fn with_claim_ttl(mut self, ttl: Duration) -> Self {
        self.claim_ttl = ttl;
        self
    }

    /// Archive a live record into the recycle bin and remove it.
    ///
    /// Hosted assets are left in place so the record can be restored
    /// without re-uploading anything.
    pub async fn soft_delete(
        &self,
        collection: CollectionType,
        id: &str,
    ) -> Result<RecycleBinEntry, LifecycleError> {
        let entity = self
            .entities
            .get_entity(collection, id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(collection.as_str(), id))?;

        let info = collection.info();
        let item = entity
            .to_payload()
            .with_context(|| format!("failed to encode {} {}", collection, id))?;
        let sort_value = serde_json::to_value(entity.sort_value())
            .context("failed to encode sort value")?;

        let entry = RecycleBinEntry {
            id: Uuid::new_v4().to_string(),
            collection_type: collection.as_str().to_string(),
            item,
            deleted_at: Utc::now(),
            original_sort_field: info.sort_field.to_string(),
            original_sort_value: sort_value,
        };

        self.bin
            .insert_entry(&entry)
            .await
            .with_context(|| format!("failed to archive {} {}", collection, id))?;

        // On error the archive copy stays; a duplicate is recoverable, a
        // lost record is not.
        let removed = self
            .entities
            .delete_entity(collection, id)
            .await
            .with_context(|| format!("archived {} {} but failed to remove it", collection, id))?;
        if !removed {
            // Someone else deleted it first and owns the archive entry.
            self.bin.delete_entry(&entry.id).await.with_context(|| {
                format!("failed to drop duplicate archive entry {}", entry.id)
            })?;
            tracing::warn!(%collection, %id, "record removed concurrently; archive entry dropped");
            return Err(LifecycleError::not_found(collection.as_str(), id));
        }

        tracing::info!(%collection, %id, entry_id = %entry.id, "moved to recycle bin");
        Ok(entry)
    }

    /// Recreate an archived record in its collection under a fresh id.
    pub async fn restore(&self, entry_id: &str) -> Result<Entity, LifecycleError> {
        let token = Uuid::new_v4().to_string();
        let entry = self.claim(entry_id, &token).await?;
        match self.restore_claimed(&entry, &token).await {
            Ok(entity) => Ok(entity),
            Err(err) => {
                self.release(entry_id, &token).await;
                Err(err)
            }
        }
    }

    async fn restore_claimed(
        &self,
        entry: &RecycleBinEntry,
        token: &str,
    ) -> Result<Entity, LifecycleError> {
        let collection: CollectionType = entry
            .collection_type
            .parse()
            .map_err(|_| LifecycleError::UnknownCollectionType(entry.collection_type.clone()))?;
        let info = collection.info();

        let mut payload = entry.item.clone();
        if !payload.is_object() {
            return Err(LifecycleError::validation(
                collection,
                "archived item is not an object",
            ));
        }
        strip_fields(&mut payload, IDENTITY_FIELDS);
        info.strip_legacy(&mut payload);

        let missing = info.missing_fields(&payload);
        if !missing.is_empty() {
            return Err(LifecycleError::validation(
                collection,
                format!("missing required fields: {}", missing.join(", ")),
            ));
        }

        payload["id"] = Value::String(Uuid::new_v4().to_string());
        let entity = Entity::from_payload(collection, payload)
            .map_err(|e| LifecycleError::validation(collection, e.to_string()))?;

        self.renew(&entry.id, token).await?;
        self.entities
            .insert_entity(&entity)
            .await
            .with_context(|| format!("failed to restore {} from entry {}", collection, entry.id))?;

        let removed = self
            .bin
            .delete_entry(&entry.id)
            .await
            .with_context(|| format!("restored {} but failed to remove entry {}", collection, entry.id))?;
        if !removed {
            tracing::warn!(entry_id = %entry.id, "recycle bin entry vanished during restore");
        }

        tracing::info!(
            %collection,
            entry_id = %entry.id,
            new_id = %entity.id(),
            "restored from recycle bin"
        );
        Ok(entity)
    }

    /// Permanently remove an entry, cleaning up its hosted images.
    ///
    /// Asset deletion is best effort: failures are reported in the
    /// [`PurgeReport`] and never prevent the entry from being removed.
    pub async fn purge(&self, entry_id: &str) -> Result<PurgeReport, LifecycleError> {
        let token = Uuid::new_v4().to_string();
        let entry = self.claim(entry_id, &token).await?;
        match self.purge_claimed(&entry, &token).await {
            Ok(report) => Ok(report),
            Err(err) => {
                self.release(entry_id, &token).await;
                Err(err)
            }
        }
    }

    async fn purge_claimed(
        &self,
        entry: &RecycleBinEntry,
        token: &str,
    ) -> Result<PurgeReport, LifecycleError> {
        let targets = match entry.collection_type.parse::<CollectionType>() {
            Ok(collection) => match collection.info().asset_folder {
                Some(folder) => hosted_public_ids(
                    self.assets.as_ref(),
                    folder,
                    snapshot_image_urls(collection, &entry.item),
                ),
                None => Vec::new(),
            },
            Err(_) => {
                tracing::warn!(
                    entry_id = %entry.id,
                    collection_type = %entry.collection_type,
                    "unknown collection type; purging without asset cleanup"
                );
                Vec::new()
            }
        };

        let mut assets = Vec::with_capacity(targets.len());
        for (url, public_id) in targets {
            self.renew(&entry.id, token).await?;
            assets.push(delete_asset(self.assets.as_ref(), url, public_id).await);
        }

        let removed = self
            .bin
            .delete_entry(&entry.id)
            .await
            .with_context(|| format!("failed to remove recycle bin entry {}", entry.id))?;
        if !removed {
            return Err(LifecycleError::not_found("recycle bin entry", &entry.id));
        }

        let report = PurgeReport {
            entry_id: entry.id.clone(),
            collection_type: entry.collection_type.clone(),
            assets,
        };
        tracing::info!(
            entry_id = %report.entry_id,
            assets = report.assets.len(),
            failed = report.failed_assets(),
            "purged recycle bin entry"
        );
        Ok(report)
    }

    /// All entries, newest first, with legacy fields stripped from items.
    pub async fn list(&self) -> Result<Vec<RecycleBinEntry>, LifecycleError> {
        let mut entries = self.bin.list_entries().await?;
        for entry in &mut entries {
            if let Ok(collection) = entry.collection_type.parse::<CollectionType>() {
                collection.info().strip_legacy(&mut entry.item);
            }
        }
        Ok(entries)
    }

    async fn claim(&self, entry_id: &str, token: &str) -> Result<RecycleBinEntry, LifecycleError> {
        let now = Utc::now();
        self.bin
            .claim_entry(entry_id, token, now, now - self.claim_ttl)
            .await?
            .ok_or_else(|| LifecycleError::not_found("recycle bin entry", entry_id))
    }

    /// Refresh our claim, or fail with NotFound if another caller took it.
    async fn renew(&self, entry_id: &str, token: &str) -> Result<(), LifecycleError> {
        if self.bin.renew_claim(entry_id, token, Utc::now()).await? {
            return Ok(());
        }
        tracing::warn!(%entry_id, "recycle bin claim lost; stopping");
        Err(LifecycleError::not_found("recycle bin entry", entry_id))
    }

    async fn release(&self, entry_id: &str, token: &str) {
        if let Err(e) = self.bin.release_entry(entry_id, token).await {
            tracing::error!(%entry_id, error = %e, "failed to release recycle bin claim");
        }
    }
}

/// Image URLs referenced by an archived snapshot.
///
/// Snapshots normally decode into their typed record. Older snapshots that
/// no longer decode are read field by field through the collection's image
/// layout instead.
fn snapshot_image_urls(collection: CollectionType, item: &Value) -> Vec<String> {
    match Entity::from_payload(collection, item.clone()) {
        Ok(entity) => entity.image_urls().into_iter().map(str::to_string).collect(),
        Err(e) => {
            tracing::debug!(%collection, error = %e, "snapshot does not decode; reading image fields directly");
            collection.info().image_layout.urls_in(item)
        }
    }
}
