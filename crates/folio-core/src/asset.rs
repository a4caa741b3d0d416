//! Asset store abstraction and public-id derivation.
//!
//! Images are hosted by an external service and referenced from records by
//! URL. Deleting a hosted image needs its folder-scoped public id, which is
//! derived from the URL with [`public_id_from_url`]. Uploads pick ids with
//! [`upload_public_id`] so the two stay in agreement.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// External binary/media store addressed by URL.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Short identifier for logs (`"cloudinary"`, `"disabled"`).
    fn name(&self) -> &str;

    /// Whether `url` points at an asset held by this store.
    fn hosts(&self, url: &str) -> bool;

    /// Upload `bytes` as `{folder}/{public_id}` and return the secure URL.
    async fn upload(&self, bytes: Vec<u8>, folder: &str, public_id: &str) -> Result<String>;

    /// Delete the asset with the given folder-scoped public id.
    async fn delete(&self, public_id: &str) -> Result<()>;
}

/// A single failed asset deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("failed to delete asset {public_id}: {message}")]
pub struct AssetStoreError {
    pub public_id: String,
    pub message: String,
}

/// Outcome of one attempted asset deletion during a purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDeletion {
    pub url: String,
    pub public_id: String,
    #[serde(flatten)]
    pub outcome: AssetOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssetOutcome {
    Deleted,
    Failed { error: AssetStoreError },
}

impl AssetDeletion {
    pub fn is_deleted(&self) -> bool {
        matches!(self.outcome, AssetOutcome::Deleted)
    }
}

/// Derive the folder-scoped public id for a hosted URL.
///
/// The id is `"{folder}/{stem}"`, where `stem` is the last path segment of
/// the URL up to its first `.`. Query strings and fragments are ignored.
/// Returns `None` when no stem can be extracted, including for an absolute
/// URL with no path after the host.
///
/// ```
/// use folio_core::asset::public_id_from_url;
///
/// let url = "https://res.cloudinary.com/demo/image/upload/v17/projects/1700-cover.jpg";
/// assert_eq!(public_id_from_url(url, "projects").as_deref(), Some("projects/1700-cover"));
/// ```
pub fn public_id_from_url(url: &str, folder: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = match path.split_once("://") {
        Some((_, rest)) => rest.split_once('/')?.1,
        None => path,
    };
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let stem = segment.split('.').next()?;
    if stem.is_empty() {
        return None;
    }
    Some(format!("{}/{}", folder, stem))
}

/// Build the public id (without folder) used for a new upload.
///
/// `"{unix_millis}-{stem}"`, with every character outside
/// `[A-Za-z0-9_-]` in the stem replaced by `_`, so the id contains no `.`
/// or `/` and [`public_id_from_url`] recovers it from the delivered URL.
pub fn upload_public_id(filename: &str, unix_millis: i64) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let stem = match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    };
    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized
    };
    format!("{}-{}", unix_millis, sanitized)
}

/// Hosted URLs in `urls` paired with their public ids under `folder`.
///
/// URLs the store does not host, and URLs with no derivable public id, are
/// skipped. Duplicate public ids are kept once.
pub fn hosted_public_ids<I>(store: &dyn AssetStore, folder: &str, urls: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    for url in urls {
        if !store.hosts(&url) {
            tracing::debug!(%url, store = store.name(), "skipping asset not hosted by store");
            continue;
        }
        let public_id = match public_id_from_url(&url, folder) {
            Some(id) => id,
            None => {
                tracing::warn!(%url, "cannot derive public id from asset url");
                continue;
            }
        };
        if seen.insert(public_id.clone()) {
            out.push((url, public_id));
        }
    }

    out
}

/// Attempt one deletion; failures are logged and reported, never returned.
pub async fn delete_asset(store: &dyn AssetStore, url: String, public_id: String) -> AssetDeletion {
    let outcome = match store.delete(&public_id).await {
        Ok(()) => {
            tracing::info!(%public_id, "deleted asset");
            AssetOutcome::Deleted
        }
        Err(e) => {
            tracing::warn!(%public_id, error = %e, "failed to delete asset");
            AssetOutcome::Failed {
                error: AssetStoreError {
                    public_id: public_id.clone(),
                    message: format!("{:#}", e),
                },
            }
        }
    };
    AssetDeletion {
        url,
        public_id,
        outcome,
    }
}

/// Best-effort deletion of every hosted URL in `urls` under `folder`.
pub async fn delete_hosted<I>(store: &dyn AssetStore, folder: &str, urls: I) -> Vec<AssetDeletion>
where
    I: IntoIterator<Item = String>,
{
    let mut deletions = Vec::new();
    for (url, public_id) in hosted_public_ids(store, folder, urls) {
        deletions.push(delete_asset(store, url, public_id).await);
    }
    deletions
}

/// Image extensions accepted for upload.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Whether `filename` has an accepted image extension (case-insensitive).
pub fn is_allowed_image(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
