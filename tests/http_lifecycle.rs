//! End-to-end recycle-bin lifecycle over the HTTP API, backed by SQLite and
//! an in-process asset store that records deletions.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use folio::app::App;
use folio::config::Config;
use folio::sqlite_store::SqliteStore;
use folio::{db, migrate, server};
use folio_core::asset::AssetStore;
use folio_core::models::RecycleBinEntry;
use folio_core::store::RecycleBinStore;

struct RecordingAssets {
    failing: HashSet<String>,
    deleted: Mutex<Vec<String>>,
}

impl RecordingAssets {
    fn new(failing: &[&str]) -> Self {
        Self {
            failing: failing.iter().map(|s| s.to_string()).collect(),
            deleted: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        let mut calls = self.deleted.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl AssetStore for RecordingAssets {
    fn name(&self) -> &str {
        "recording"
    }

    fn hosts(&self, url: &str) -> bool {
        url.contains("res.cloudinary.com")
    }

    async fn upload(&self, _bytes: Vec<u8>, folder: &str, public_id: &str) -> Result<String> {
        Ok(format!(
            "https://res.cloudinary.com/demo/image/upload/v1/{}/{}.png",
            folder, public_id
        ))
    }

    async fn delete(&self, public_id: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(public_id.to_string());
        if self.failing.contains(public_id) {
            bail!("simulated outage deleting {}", public_id);
        }
        Ok(())
    }
}

struct TestServer {
    base: String,
    client: reqwest::Client,
    assets: Arc<RecordingAssets>,
    store: Arc<SqliteStore>,
    _tmp: TempDir,
}

impl TestServer {
    async fn start(assets: RecordingAssets) -> Self {
        let tmp = TempDir::new().unwrap();
        let config: Config = toml::from_str(&format!(
            r#"
[db]
path = "{}"

[server]
bind = "127.0.0.1:0"

[assets]
max_upload_bytes = 1024
"#,
            tmp.path().join("folio.sqlite").display()
        ))
        .unwrap();

        let pool = db::connect(&config).await.unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        let store = Arc::new(SqliteStore::new(pool));
        let assets = Arc::new(assets);
        let app = Arc::new(App::with_config(
            &config,
            store.clone(),
            store.clone(),
            assets.clone(),
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, server::router(app)).await.ok();
        });

        Self {
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
            assets,
            store,
            _tmp: tmp,
        }
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> (u16, Value) {
        let mut req = self.client.request(method, format!("{}{}", self.base, path));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status().as_u16();
        let body = resp.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        self.send(reqwest::Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> (u16, Value) {
        self.send(reqwest::Method::POST, path, body).await
    }

    async fn delete(&self, path: &str) -> (u16, Value) {
        self.send(reqwest::Method::DELETE, path, None).await
    }
}

fn without_identity(mut record: Value) -> Value {
    let obj = record.as_object_mut().unwrap();
    obj.remove("id");
    record
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let server = TestServer::start(RecordingAssets::new(&[])).await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}

/// Create, soft delete, restore, soft delete again, purge.
#[tokio::test]
async fn test_project_lifecycle() {
    let server = TestServer::start(RecordingAssets::new(&[])).await;

    let (status, created) = server
        .post(
            "/api/projects",
            Some(json!({
                "title": "X",
                "description": "Y",
                "mainImage": "https://res.cloudinary.com/demo/image/upload/v1/projects/main.jpg",
                "additionalImages": [
                    { "url": "https://res.cloudinary.com/demo/image/upload/v1/projects/a.jpg", "description": "a" },
                    { "url": "https://res.cloudinary.com/demo/image/upload/v1/projects/b.jpg", "description": "b" }
                ]
            })),
        )
        .await;
    assert_eq!(status, 200, "{}", created);
    let original_id = created["id"].as_str().unwrap().to_string();

    // Soft delete moves it to the bin.
    let (status, _) = server.delete(&format!("/api/projects/{}", original_id)).await;
    assert_eq!(status, 200);
    let (_, projects) = server.get("/api/projects").await;
    assert_eq!(projects, json!([]));
    let (_, bin) = server.get("/api/recycle-bin").await;
    assert_eq!(bin.as_array().unwrap().len(), 1);
    assert_eq!(bin[0]["collectionType"], "Project");
    assert_eq!(bin[0]["item"], created);
    let entry_id = bin[0]["id"].as_str().unwrap().to_string();

    // Restore recreates it under a new id.
    let (status, restored) = server
        .post(&format!("/api/recycle-bin/restore/{}", entry_id), None)
        .await;
    assert_eq!(status, 200, "{}", restored);
    let new_id = restored["id"].as_str().unwrap().to_string();
    assert_ne!(new_id, original_id);

    let (status, live) = server.get(&format!("/api/projects/{}", new_id)).await;
    assert_eq!(status, 200);
    assert_eq!(without_identity(live), without_identity(created));
    let (_, bin) = server.get("/api/recycle-bin").await;
    assert_eq!(bin, json!([]));
    assert!(server.assets.calls().is_empty());

    // Restoring the same entry again finds nothing.
    let (status, body) = server
        .post(&format!("/api/recycle-bin/restore/{}", entry_id), None)
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");

    // Delete again, then purge.
    server.delete(&format!("/api/projects/{}", new_id)).await;
    let (_, bin) = server.get("/api/recycle-bin").await;
    let entry_id = bin[0]["id"].as_str().unwrap().to_string();

    let (status, purged) = server
        .delete(&format!("/api/recycle-bin/{}", entry_id))
        .await;
    assert_eq!(status, 200, "{}", purged);
    assert_eq!(purged["assets"].as_array().unwrap().len(), 3);
    assert_eq!(
        server.assets.calls(),
        vec!["projects/a", "projects/b", "projects/main"]
    );
    let (_, bin) = server.get("/api/recycle-bin").await;
    assert_eq!(bin, json!([]));
    let (_, projects) = server.get("/api/projects").await;
    assert_eq!(projects, json!([]));
}

#[tokio::test]
async fn test_purge_with_failing_asset_still_removes_entry() {
    let server = TestServer::start(RecordingAssets::new(&["blog/b"])).await;
    let (_, created) = server
        .post(
            "/api/blog",
            Some(json!({
                "title": "Post",
                "content": "Body",
                "mainImage": "https://res.cloudinary.com/demo/image/upload/v1/blog/a.jpg",
                "additionalImages": [
                    { "url": "https://res.cloudinary.com/demo/image/upload/v1/blog/b.jpg" },
                    { "url": "https://res.cloudinary.com/demo/image/upload/v1/blog/c.jpg" }
                ]
            })),
        )
        .await;
    server
        .delete(&format!("/api/blog/{}", created["id"].as_str().unwrap()))
        .await;
    let (_, bin) = server.get("/api/recycle-bin").await;
    let entry_id = bin[0]["id"].as_str().unwrap().to_string();

    let (status, purged) = server
        .delete(&format!("/api/recycle-bin/{}", entry_id))
        .await;
    assert_eq!(status, 200);
    let failed: Vec<&Value> = purged["assets"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|a| a["status"] == "failed")
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["publicId"], "blog/b");
    assert!(failed[0]["error"]["message"]
        .as_str()
        .unwrap()
        .contains("simulated outage"));
    assert_eq!(server.assets.calls().len(), 3);

    let (status, _) = server
        .delete(&format!("/api/recycle-bin/{}", entry_id))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_certificate_legacy_field_is_dropped() {
    let server = TestServer::start(RecordingAssets::new(&[])).await;
    server
        .store
        .insert_entry(&RecycleBinEntry {
            id: "legacy-cert".into(),
            collection_type: "Certificate".into(),
            item: json!({
                "_id": "65f0c0ffee",
                "title": "Rust Certified",
                "issuingOrganization": "Ferris Foundation",
                "issueDate": "2023-06-01T00:00:00Z",
                "mainImage": "https://res.cloudinary.com/demo/certificates/c.png",
                "credentialUrl": "http://old",
                "__v": 0
            }),
            deleted_at: chrono::Utc::now(),
            original_sort_field: "updatedAt".into(),
            original_sort_value: json!("2023-06-01T00:00:00Z"),
        })
        .await
        .unwrap();

    let (_, bin) = server.get("/api/recycle-bin").await;
    assert!(bin[0]["item"].get("credentialUrl").is_none());

    let (status, restored) = server
        .post("/api/recycle-bin/restore/legacy-cert", None)
        .await;
    assert_eq!(status, 200, "{}", restored);

    let (_, certs) = server.get("/api/certificates").await;
    assert_eq!(certs.as_array().unwrap().len(), 1);
    assert_eq!(certs[0]["title"], "Rust Certified");
    assert!(certs[0].get("credentialUrl").is_none());
    assert_eq!(certs[0]["id"], restored["id"]);
}

#[tokio::test]
async fn test_unknown_collection_type_rejected() {
    let server = TestServer::start(RecordingAssets::new(&[])).await;
    server
        .store
        .insert_entry(&RecycleBinEntry {
            id: "drifted".into(),
            collection_type: "Testimonial".into(),
            item: json!({ "quote": "great work" }),
            deleted_at: chrono::Utc::now(),
            original_sort_field: "createdAt".into(),
            original_sort_value: json!(null),
        })
        .await
        .unwrap();

    let (status, body) = server.post("/api/recycle-bin/restore/drifted", None).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "unknown_collection_type");

    let (_, bin) = server.get("/api/recycle-bin").await;
    assert_eq!(bin[0]["id"], "drifted");
}

#[tokio::test]
async fn test_validation_errors_and_missing_records() {
    let server = TestServer::start(RecordingAssets::new(&[])).await;

    let (status, body) = server
        .post("/api/contacts", Some(json!({ "name": "Ada", "email": "ada@example.com" })))
        .await;
    assert_eq!(status, 422);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, _) = server.delete("/api/skills/does-not-exist").await;
    assert_eq!(status, 404);

    let (status, body) = server.get("/api/testimonials").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_upload_limits() {
    let server = TestServer::start(RecordingAssets::new(&[])).await;

    let resp = server
        .client
        .post(format!("{}/api/assets/skills?filename=rust.png", server.base))
        .body(vec![0u8; 16])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["url"].as_str().unwrap().contains("/skills/"));

    let resp = server
        .client
        .post(format!("{}/api/assets/skills?filename=rust.gif", server.base))
        .body(vec![0u8; 16])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let resp = server
        .client
        .post(format!("{}/api/assets/skills?filename=big.png", server.base))
        .body(vec![0u8; 1500])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 413);
}
