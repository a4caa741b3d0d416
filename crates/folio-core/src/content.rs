//! Create, read, and update for the live collections, plus image upload.
//!
//! Deletion is not here: removing a live record always goes through
//! [`LifecycleManager::soft_delete`](crate::lifecycle::LifecycleManager::soft_delete).

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::asset::{delete_hosted, is_allowed_image, upload_public_id, AssetDeletion, AssetStore};
use crate::collection::{strip_fields, CollectionType, IDENTITY_FIELDS};
use crate::lifecycle::LifecycleError;
use crate::models::Entity;
use crate::store::EntityStore;

/// Default upload size ceiling (5 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Errors from [`ContentManager::upload`].
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{0} records have no image folder")]
    NoImages(CollectionType),

    #[error("unsupported file type: {0} (allowed: jpg, jpeg, png)")]
    UnsupportedType(String),

    #[error("upload is {size} bytes; the limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("asset store upload failed: {0:#}")]
    Store(anyhow::Error),
}

/// A record after a successful update, with any images it dropped.
#[derive(Debug)]
pub struct Updated {
    pub entity: Entity,
    pub removed_assets: Vec<AssetDeletion>,
}

pub struct ContentManager {
    entities: Arc<dyn EntityStore>,
    assets: Arc<dyn AssetStore>,
    max_upload_bytes: usize,
}

impl ContentManager {
    pub fn new(entities: Arc<dyn EntityStore>, assets: Arc<dyn AssetStore>) -> Self {
        Self {
            entities,
            assets,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub async fn list(&self, collection: CollectionType) -> Result<Vec<Entity>, LifecycleError> {
        Ok(self.entities.list_entities(collection).await?)
    }

    pub async fn get(&self, collection: CollectionType, id: &str) -> Result<Entity, LifecycleError> {
        self.entities
            .get_entity(collection, id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(collection.as_str(), id))
    }

    /// Validate `payload` and insert it under a fresh id.
    ///
    /// Client-supplied identity fields are ignored; missing timestamps
    /// default to now.
    pub async fn create(
        &self,
        collection: CollectionType,
        payload: Value,
    ) -> Result<Entity, LifecycleError> {
        let id = Uuid::new_v4().to_string();
        let entity = build_entity(collection, payload, &id)?;

        self.entities
            .insert_entity(&entity)
            .await
            .with_context(|| format!("failed to create {}", collection))?;

        tracing::info!(%collection, %id, "created record");
        Ok(entity)
    }

    /// Merge `payload` over the existing record and replace it.
    ///
    /// Fields absent from `payload` keep their stored values. The id never
    /// changes and `updatedAt` is refreshed. Hosted images referenced by the
    /// old version but not the new one are deleted, best effort.
    pub async fn update(
        &self,
        collection: CollectionType,
        id: &str,
        payload: Value,
    ) -> Result<Updated, LifecycleError> {
        let Value::Object(mut changes) = payload else {
            return Err(LifecycleError::validation(collection, "payload must be a JSON object"));
        };
        for field in IDENTITY_FIELDS {
            changes.remove(*field);
        }

        let existing = self.get(collection, id).await?;
        let mut merged = existing
            .to_payload()
            .with_context(|| format!("failed to encode {} {}", collection, id))?;
        if let Some(obj) = merged.as_object_mut() {
            obj.extend(changes);
        }

        let mut entity = build_entity(collection, merged, id)?;
        entity.touch(Utc::now());

        let replaced = self
            .entities
            .replace_entity(&entity)
            .await
            .with_context(|| format!("failed to update {} {}", collection, id))?;
        if !replaced {
            return Err(LifecycleError::not_found(collection.as_str(), id));
        }

        let kept: HashSet<&str> = entity.image_urls().into_iter().collect();
        let dropped: Vec<String> = existing
            .image_urls()
            .into_iter()
            .filter(|url| !kept.contains(url))
            .map(str::to_string)
            .collect();
        let removed_assets = match collection.info().asset_folder {
            Some(folder) if !dropped.is_empty() => {
                delete_hosted(self.assets.as_ref(), folder, dropped).await
            }
            _ => Vec::new(),
        };

        tracing::info!(%collection, %id, dropped_assets = removed_assets.len(), "updated record");
        Ok(Updated {
            entity,
            removed_assets,
        })
    }

    /// Upload an image into the collection's folder and return its URL.
    pub async fn upload(
        &self,
        collection: CollectionType,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, UploadError> {
        let folder = collection
            .info()
            .asset_folder
            .ok_or(UploadError::NoImages(collection))?;
        if !is_allowed_image(filename) {
            return Err(UploadError::UnsupportedType(filename.to_string()));
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                limit: self.max_upload_bytes,
            });
        }

        let public_id = upload_public_id(filename, Utc::now().timestamp_millis());
        let size = bytes.len();
        let url = self
            .assets
            .upload(bytes, folder, &public_id)
            .await
            .map_err(UploadError::Store)?;

        tracing::info!(%collection, %folder, %public_id, size, "uploaded image");
        Ok(url)
    }
}

/// Strip identity fields, check required fields, and decode under `id`.
fn build_entity(
    collection: CollectionType,
    mut payload: Value,
    id: &str,
) -> Result<Entity, LifecycleError> {
    if !payload.is_object() {
        return Err(LifecycleError::validation(collection, "payload must be a JSON object"));
    }
    let info = collection.info();
    strip_fields(&mut payload, IDENTITY_FIELDS);
    info.strip_legacy(&mut payload);

    let missing = info.missing_fields(&payload);
    if !missing.is_empty() {
        return Err(LifecycleError::validation(
            collection,
            format!("missing required fields: {}", missing.join(", ")),
        ));
    }

    payload["id"] = Value::String(id.to_string());
    Entity::from_payload(collection, payload)
        .map_err(|e| LifecycleError::validation(collection, e.to_string()))
}
