use anyhow::Result;
use sqlx::SqlitePool;

use folio_core::collection::COLLECTIONS;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index if missing. Safe to run repeatedly.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // One table per collection; the record itself is stored as JSON.
    for info in COLLECTIONS {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                sort_key TEXT NOT NULL
            )
            "#,
            table = info.collection
        ))
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_sort_key ON {table}(sort_key DESC)",
            table = info.collection
        ))
        .execute(pool)
        .await?;
    }

    // Create recycle bin table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recycle_bin (
            id TEXT PRIMARY KEY,
            collection_type TEXT NOT NULL,
            item TEXT NOT NULL,
            deleted_at INTEGER NOT NULL,
            original_sort_field TEXT NOT NULL,
            original_sort_value TEXT NOT NULL,
            claim_token TEXT,
            claimed_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Databases created before claim tokens existed lack the column.
    let (has_token,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM pragma_table_info('recycle_bin') WHERE name = 'claim_token'",
    )
    .fetch_one(pool)
    .await?;
    if has_token == 0 {
        sqlx::query("ALTER TABLE recycle_bin ADD COLUMN claim_token TEXT")
            .execute(pool)
            .await?;
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_recycle_bin_deleted_at ON recycle_bin(deleted_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
