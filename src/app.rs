//! Wiring of stores, asset store, and managers shared by the CLI and server.

use anyhow::Result;
use std::sync::Arc;

use folio_core::asset::AssetStore;
use folio_core::content::ContentManager;
use folio_core::lifecycle::LifecycleManager;
use folio_core::store::{EntityStore, RecycleBinStore};

use crate::assets::create_asset_store;
use crate::config::Config;
use crate::sqlite_store::SqliteStore;
use crate::{db, migrate};

/// Everything a request or command needs to operate on content.
pub struct App {
    pub lifecycle: LifecycleManager,
    pub content: ContentManager,
    pub max_upload_bytes: usize,
}

impl App {
    /// Build with default limits over the given stores.
    pub fn new(
        entities: Arc<dyn EntityStore>,
        bin: Arc<dyn RecycleBinStore>,
        assets: Arc<dyn AssetStore>,
    ) -> Self {
        Self {
            lifecycle: LifecycleManager::new(entities.clone(), bin, assets.clone()),
            content: ContentManager::new(entities, assets),
            max_upload_bytes: folio_core::content::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Build over the given stores with limits taken from `config`.
    pub fn with_config(
        config: &Config,
        entities: Arc<dyn EntityStore>,
        bin: Arc<dyn RecycleBinStore>,
        assets: Arc<dyn AssetStore>,
    ) -> Self {
        let claim_ttl = chrono::Duration::seconds(config.lifecycle.claim_ttl_secs as i64);
        let max_upload_bytes = config.assets.max_upload_bytes;
        Self {
            lifecycle: LifecycleManager::new(entities.clone(), bin, assets.clone())
                .with_claim_ttl(claim_ttl),
            content: ContentManager::new(entities, assets).with_max_upload_bytes(max_upload_bytes),
            max_upload_bytes,
        }
    }

    /// Open the configured SQLite database and asset store.
    ///
    /// The schema is applied first, so a fresh database works without a
    /// separate `folio init`.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply_schema(&pool).await?;
        let store = Arc::new(SqliteStore::new(pool));
        let assets = create_asset_store(&config.assets)?;
        tracing::debug!(db = %config.db.path.display(), assets = assets.name(), "opened stores");
        Ok(Self::with_config(config, store.clone(), store, assets))
    }
}
