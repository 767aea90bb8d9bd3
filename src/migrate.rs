use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the schema in the configured database (`mapctl init`).
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    ensure_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create tables and indexes if they do not exist yet. Idempotent.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    // One row per map, unique by name
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS maps (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            created INTEGER NOT NULL,
            modified INTEGER NOT NULL,
            resolution REAL NOT NULL,
            width INTEGER NOT NULL,
            height INTEGER NOT NULL,
            origin_x REAL NOT NULL,
            origin_y REAL NOT NULL,
            image BLOB,
            thumbnail BLOB,
            pbstream BLOB,
            node_graph TEXT,
            area_tree TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Zones are owned by their map and replaced as a whole
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS zones (
            map_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            polygon_json TEXT NOT NULL,
            PRIMARY KEY (map_id, position),
            FOREIGN KEY (map_id) REFERENCES maps(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_maps_modified ON maps(modified DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
