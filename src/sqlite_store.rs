//! SQLite-backed [`EntityStore`] and [`RecycleBinStore`].
//!
//! Each collection lives in its own table (named after the collection in
//! the dispatch table) with the record as a JSON `body` and a `sort_key`
//! column for ordering. The recycle bin is a single `recycle_bin` table;
//! its `claim_token` and `claimed_at` columns carry restore/purge claims.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use folio_core::collection::CollectionType;
use folio_core::models::{Entity, RecycleBinEntry};
use folio_core::store::{EntityStore, RecycleBinStore};

/// SQLite implementation of both store traits.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn sort_key(entity: &Entity) -> String {
    entity
        .sort_value()
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn table(collection: CollectionType) -> &'static str {
    collection.info().collection
}

fn decode_entity(collection: CollectionType, row: &SqliteRow) -> Result<Entity> {
    let id: String = row.try_get("id")?;
    let body: String = row.try_get("body")?;
    let payload: serde_json::Value = serde_json::from_str(&body)
        .with_context(|| format!("corrupt {} row {}", collection, id))?;
    Entity::from_payload(collection, payload)
        .with_context(|| format!("cannot decode {} row {}", collection, id))
}

fn decode_entry(row: &SqliteRow) -> Result<RecycleBinEntry> {
    let id: String = row.try_get("id")?;
    let item: String = row.try_get("item")?;
    let sort_value: String = row.try_get("original_sort_value")?;
    let deleted_at: i64 = row.try_get("deleted_at")?;

    Ok(RecycleBinEntry {
        collection_type: row.try_get("collection_type")?,
        item: serde_json::from_str(&item)
            .with_context(|| format!("corrupt recycle bin item {}", id))?,
        deleted_at: DateTime::from_timestamp_millis(deleted_at)
            .ok_or_else(|| anyhow!("invalid deleted_at {} on entry {}", deleted_at, id))?,
        original_sort_field: row.try_get("original_sort_field")?,
        original_sort_value: serde_json::from_str(&sort_value)
            .with_context(|| format!("corrupt sort value on entry {}", id))?,
        id,
    })
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn insert_entity(&self, entity: &Entity) -> Result<()> {
        let body = serde_json::to_string(&entity.to_payload()?)?;
        sqlx::query(&format!(
            "INSERT INTO {} (id, body, sort_key) VALUES (?, ?, ?)",
            table(entity.collection_type())
        ))
        .bind(entity.id())
        .bind(&body)
        .bind(sort_key(entity))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_entity(&self, entity: &Entity) -> Result<bool> {
        let body = serde_json::to_string(&entity.to_payload()?)?;
        let result = sqlx::query(&format!(
            "UPDATE {} SET body = ?, sort_key = ? WHERE id = ?",
            table(entity.collection_type())
        ))
        .bind(&body)
        .bind(sort_key(entity))
        .bind(entity.id())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_entity(&self, collection: CollectionType, id: &str) -> Result<Option<Entity>> {
        let row = sqlx::query(&format!(
            "SELECT id, body FROM {} WHERE id = ?",
            table(collection)
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| decode_entity(collection, &r)).transpose()
    }

    async fn delete_entity(&self, collection: CollectionType, id: &str) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table(collection)))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_entities(&self, collection: CollectionType) -> Result<Vec<Entity>> {
        let rows = sqlx::query(&format!(
            "SELECT id, body FROM {} ORDER BY sort_key DESC, id ASC",
            table(collection)
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|r| decode_entity(collection, r)).collect()
    }
}

#[async_trait]
impl RecycleBinStore for SqliteStore {
    async fn insert_entry(&self, entry: &RecycleBinEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recycle_bin (id, collection_type, item, deleted_at,
                                     original_sort_field, original_sort_value)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.collection_type)
        .bind(serde_json::to_string(&entry.item)?)
        .bind(entry.deleted_at.timestamp_millis())
        .bind(&entry.original_sort_field)
        .bind(serde_json::to_string(&entry.original_sort_value)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_entry(&self, id: &str) -> Result<Option<RecycleBinEntry>> {
        let row = sqlx::query("SELECT * FROM recycle_bin WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode_entry(&r)).transpose()
    }

    async fn list_entries(&self) -> Result<Vec<RecycleBinEntry>> {
        let rows = sqlx::query("SELECT * FROM recycle_bin ORDER BY deleted_at DESC, id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_entry).collect()
    }

    async fn claim_entry(
        &self,
        id: &str,
        token: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<RecycleBinEntry>> {
        let claimed = sqlx::query(
            r#"
            UPDATE recycle_bin SET claim_token = ?, claimed_at = ?
            WHERE id = ? AND (claimed_at IS NULL OR claimed_at < ?)
            "#,
        )
        .bind(token)
        .bind(now.timestamp_millis())
        .bind(id)
        .bind(stale_before.timestamp_millis())
        .execute(&self.pool)
        .await?;

        if claimed.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_entry(id).await
    }

    async fn renew_claim(&self, id: &str, token: &str, now: DateTime<Utc>) -> Result<bool> {
        let renewed = sqlx::query(
            "UPDATE recycle_bin SET claimed_at = ? WHERE id = ? AND claim_token = ?",
        )
        .bind(now.timestamp_millis())
        .bind(id)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(renewed.rows_affected() > 0)
    }

    async fn release_entry(&self, id: &str, token: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE recycle_bin SET claim_token = NULL, claimed_at = NULL
            WHERE id = ? AND claim_token = ?
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_entry(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recycle_bin WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::apply_schema(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn contact(id: &str, created_at: &str) -> Entity {
        Entity::from_payload(
            CollectionType::Contact,
            json!({
                "id": id,
                "name": "Ada",
                "email": "ada@example.com",
                "message": "hello",
                "createdAt": created_at
            }),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_entities_sorted_newest_first() {
        let store = store().await;
        store.insert_entity(&contact("a", "2023-01-01T00:00:00Z")).await.unwrap();
        store.insert_entity(&contact("b", "2024-01-01T00:00:00Z")).await.unwrap();

        let ids: Vec<String> = store
            .list_entities(CollectionType::Contact)
            .await
            .unwrap()
            .iter()
            .map(|e| e.id().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_duplicate_insert_fails() {
        let store = store().await;
        let entity = contact("a", "2023-01-01T00:00:00Z");
        store.insert_entity(&entity).await.unwrap();
        assert!(store.insert_entity(&entity).await.is_err());
    }

    #[tokio::test]
    async fn test_replace_and_delete() {
        let store = store().await;
        let entity = contact("a", "2023-01-01T00:00:00Z");
        assert!(!store.replace_entity(&entity).await.unwrap());
        store.insert_entity(&entity).await.unwrap();
        assert!(store.replace_entity(&entity).await.unwrap());
        assert!(store.delete_entity(CollectionType::Contact, "a").await.unwrap());
        assert!(store
            .get_entity(CollectionType::Contact, "a")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_entry_claim_cycle() {
        let store = store().await;
        let now = Utc::now();
        let entry = RecycleBinEntry {
            id: "e1".into(),
            collection_type: "Contact".into(),
            item: json!({ "name": "Ada" }),
            deleted_at: now,
            original_sort_field: "createdAt".into(),
            original_sort_value: json!("2023-01-01T00:00:00Z"),
        };
        store.insert_entry(&entry).await.unwrap();

        let fetched = store.get_entry("e1").await.unwrap().unwrap();
        assert_eq!(fetched.item, entry.item);
        assert_eq!(fetched.deleted_at.timestamp_millis(), now.timestamp_millis());

        let cutoff = now - Duration::minutes(5);
        assert!(store.claim_entry("e1", "a", now, cutoff).await.unwrap().is_some());
        assert!(store.claim_entry("e1", "b", now, cutoff).await.unwrap().is_none());
        store.release_entry("e1", "b").await.unwrap();
        assert!(store.renew_claim("e1", "a", now).await.unwrap());
        store.release_entry("e1", "a").await.unwrap();
        assert!(!store.renew_claim("e1", "a", now).await.unwrap());
        assert!(store.claim_entry("e1", "b", now, cutoff).await.unwrap().is_some());

        // A stale claim is taken over and the old holder can no longer renew.
        let later = now + Duration::minutes(10);
        assert!(store
            .claim_entry("e1", "c", later, later - Duration::minutes(5))
            .await
            .unwrap()
            .is_some());
        assert!(!store.renew_claim("e1", "b", later).await.unwrap());

        assert!(store.delete_entry("e1").await.unwrap());
        assert!(store.claim_entry("e1", "d", later, later).await.unwrap().is_none());
    }
}
