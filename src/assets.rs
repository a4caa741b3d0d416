//! Asset store implementations.
//!
//! - **[`DisabledAssetStore`]** hosts nothing; uploads fail and purges skip
//!   every URL. Used when no provider is configured.
//! - **[`CloudinaryAssetStore`]** talks to the Cloudinary upload API with
//!   signed requests, retry, and backoff.
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use folio::config::AssetsConfig;
//! # use folio::assets::create_asset_store;
//! let config = AssetsConfig::default(); // provider = "disabled"
//! let store = create_asset_store(&config).unwrap();
//! assert_eq!(store.name(), "disabled");
//! ```
//!
//! # Retry Strategy
//!
//! - HTTP 429 and 5xx → retry
//! - other HTTP 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, ... (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use folio_core::asset::AssetStore;

use crate::config::AssetsConfig;

/// Asset store used when uploads are not configured.
pub struct DisabledAssetStore;

#[async_trait]
impl AssetStore for DisabledAssetStore {
    fn name(&self) -> &str {
        "disabled"
    }

    fn hosts(&self, _url: &str) -> bool {
        false
    }

    async fn upload(&self, _bytes: Vec<u8>, _folder: &str, _public_id: &str) -> Result<String> {
        bail!("asset uploads are disabled (set assets.provider in config)")
    }

    async fn delete(&self, public_id: &str) -> Result<()> {
        bail!("asset store is disabled; cannot delete {}", public_id)
    }
}

/// Cloudinary-backed asset store.
///
/// Requires `CLOUDINARY_API_KEY` and `CLOUDINARY_API_SECRET` in the
/// environment. Requests are signed with SHA-256.
pub struct CloudinaryAssetStore {
    client: reqwest::Client,
    endpoint: String,
    host: String,
    api_key: String,
    api_secret: String,
    max_retries: u32,
}

impl CloudinaryAssetStore {
    pub fn new(config: &AssetsConfig) -> Result<Self> {
        let cloud_name = config
            .cloud_name
            .clone()
            .ok_or_else(|| anyhow!("assets.cloud_name required for Cloudinary provider"))?;

        let api_key = std::env::var("CLOUDINARY_API_KEY")
            .map_err(|_| anyhow!("CLOUDINARY_API_KEY environment variable not set"))?;
        let api_secret = std::env::var("CLOUDINARY_API_SECRET")
            .map_err(|_| anyhow!("CLOUDINARY_API_SECRET environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/{}/image", config.api_base.trim_end_matches('/'), cloud_name),
            host: config.host.clone(),
            api_key,
            api_secret,
            max_retries: config.max_retries,
        })
    }

    /// Signed parameter set for a request, ready to send as form fields.
    fn signed_params(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        let signature = sign(&params, &self.api_secret);
        params.push(("api_key", self.api_key.clone()));
        params.push(("signature", signature));
        params.push(("signature_algorithm", "sha256".to_string()));
        params
    }

    /// Send a request built by `build`, retrying transient failures.
    async fn send_with_retry<F>(&self, what: &str, build: F) -> Result<serde_json::Value>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(what, attempt, ?delay, "retrying asset request");
                tokio::time::sleep(delay).await;
            }

            match build().send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("Cloudinary {} error {}: {}", what, status, body_text));
                        continue;
                    }

                    bail!("Cloudinary {} error {}: {}", what, status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Cloudinary {} failed after retries", what)))
    }
}

#[async_trait]
impl AssetStore for CloudinaryAssetStore {
    fn name(&self) -> &str {
        "cloudinary"
    }

    fn hosts(&self, url: &str) -> bool {
        url.contains(&self.host)
    }

    async fn upload(&self, bytes: Vec<u8>, folder: &str, public_id: &str) -> Result<String> {
        let url = format!("{}/upload", self.endpoint);
        let json = self
            .send_with_retry("upload", || {
                let params = self.signed_params(vec![
                    ("folder", folder.to_string()),
                    ("public_id", public_id.to_string()),
                    ("timestamp", chrono::Utc::now().timestamp().to_string()),
                ]);
                let mut form = reqwest::multipart::Form::new().part(
                    "file",
                    reqwest::multipart::Part::bytes(bytes.clone()).file_name(public_id.to_string()),
                );
                for (key, value) in params {
                    form = form.text(key, value);
                }
                self.client.post(&url).multipart(form)
            })
            .await?;

        json.get("secure_url")
            .and_then(|u| u.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid Cloudinary response: missing secure_url"))
    }

    async fn delete(&self, public_id: &str) -> Result<()> {
        let url = format!("{}/destroy", self.endpoint);
        let json = self
            .send_with_retry("destroy", || {
                let params = self.signed_params(vec![
                    ("public_id", public_id.to_string()),
                    ("timestamp", chrono::Utc::now().timestamp().to_string()),
                ]);
                self.client.post(&url).form(&params)
            })
            .await?;

        match json.get("result").and_then(|r| r.as_str()) {
            Some("ok") => Ok(()),
            // Already gone; nothing left to clean up.
            Some("not found") => {
                tracing::debug!(%public_id, "asset already absent");
                Ok(())
            }
            other => bail!("Cloudinary destroy of {} returned {:?}", public_id, other),
        }
    }
}

/// Cloudinary request signature.
///
/// Parameters are sorted by key, joined as `k=v` with `&`, the secret is
/// appended, and the result is SHA-256 hashed and hex encoded.
fn sign(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create the [`AssetStore`] named by `config.provider`.
///
/// | Config Value | Store |
/// |-------------|-------|
/// | `"disabled"` | [`DisabledAssetStore`] |
/// | `"cloudinary"` | [`CloudinaryAssetStore`] |
pub fn create_asset_store(config: &AssetsConfig) -> Result<Arc<dyn AssetStore>> {
    if !config.is_enabled() {
        return Ok(Arc::new(DisabledAssetStore));
    }
    match config.provider.as_str() {
        "cloudinary" => Ok(Arc::new(CloudinaryAssetStore::new(config)?)),
        other => bail!("Unknown asset provider: {}", other),
    }
}
