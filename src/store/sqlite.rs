//! SQLite-backed [`MapStore`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::{MapRecord, MapSummary};
use crate::zone::{Point2, Zone};

use super::MapStore;

pub struct SqliteMapStore {
    pool: SqlitePool,
}

impl SqliteMapStore {
    /// Connect to the configured database, creating the schema if needed.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await.with_context(|| {
            format!("Failed to open map database: {}", config.db.path.display())
        })?;
        migrate::ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn ts_to_utc(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).with_context(|| format!("timestamp out of range: {}", ts))
}

fn get_u32(row: &SqliteRow, column: &str) -> Result<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value).with_context(|| format!("{} out of range: {}", column, value))
}

fn row_to_record(row: &SqliteRow, zones: Vec<Zone>) -> Result<MapRecord> {
    Ok(MapRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created: ts_to_utc(row.try_get("created")?)?,
        modified: ts_to_utc(row.try_get("modified")?)?,
        resolution: row.try_get("resolution")?,
        width: get_u32(row, "width")?,
        height: get_u32(row, "height")?,
        origin_x: row.try_get("origin_x")?,
        origin_y: row.try_get("origin_y")?,
        image: row.try_get("image")?,
        thumbnail: row.try_get("thumbnail")?,
        pbstream: row.try_get("pbstream")?,
        node_graph: row.try_get("node_graph")?,
        area_tree: row.try_get("area_tree")?,
        zones,
    })
}

#[async_trait]
impl MapStore for SqliteMapStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<MapRecord>> {
        let row = sqlx::query("SELECT * FROM maps WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let map_id: String = row.try_get("id")?;
        let zone_rows = sqlx::query(
            "SELECT name, polygon_json FROM zones WHERE map_id = ? ORDER BY position ASC",
        )
        .bind(&map_id)
        .fetch_all(&self.pool)
        .await?;

        let mut zones = Vec::with_capacity(zone_rows.len());
        for zr in &zone_rows {
            let polygon_json: String = zr.try_get("polygon_json")?;
            let polygon: Vec<Point2> = serde_json::from_str(&polygon_json)
                .with_context(|| format!("corrupt zone polygon for map '{}'", name))?;
            zones.push(Zone {
                name: zr.try_get("name")?,
                polygon,
            });
        }

        Ok(Some(row_to_record(&row, zones)?))
    }

    async fn save(&self, record: &MapRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO maps (id, name, description, created, modified, resolution, width, height, origin_x, origin_y, image, thumbnail, pbstream, node_graph, area_tree)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                description = excluded.description,
                modified = excluded.modified,
                resolution = excluded.resolution,
                width = excluded.width,
                height = excluded.height,
                origin_x = excluded.origin_x,
                origin_y = excluded.origin_y,
                image = excluded.image,
                thumbnail = excluded.thumbnail,
                pbstream = excluded.pbstream,
                node_graph = excluded.node_graph,
                area_tree = excluded.area_tree
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(record.created.timestamp())
        .bind(record.modified.timestamp())
        .bind(record.resolution)
        .bind(record.width as i64)
        .bind(record.height as i64)
        .bind(record.origin_x)
        .bind(record.origin_y)
        .bind(&record.image)
        .bind(&record.thumbnail)
        .bind(&record.pbstream)
        .bind(&record.node_graph)
        .bind(&record.area_tree)
        .execute(&mut *tx)
        .await?;

        let map_id: String = sqlx::query_scalar("SELECT id FROM maps WHERE name = ?")
            .bind(&record.name)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM zones WHERE map_id = ?")
            .bind(&map_id)
            .execute(&mut *tx)
            .await?;

        for (position, zone) in record.zones.iter().enumerate() {
            sqlx::query(
                "INSERT INTO zones (map_id, position, name, polygon_json) VALUES (?, ?, ?, ?)",
            )
            .bind(&map_id)
            .bind(position as i64)
            .bind(&zone.name)
            .bind(serde_json::to_string(&zone.polygon)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<MapSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT
                m.name,
                m.description,
                m.modified,
                m.width,
                m.height,
                m.resolution,
                m.image IS NOT NULL AS has_image,
                m.pbstream IS NOT NULL AS has_pbstream,
                m.node_graph IS NOT NULL AS has_node_graph,
                m.area_tree IS NOT NULL AS has_area_tree,
                (SELECT COUNT(*) FROM zones z WHERE z.map_id = m.id) AS zone_count
            FROM maps m
            ORDER BY m.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<MapSummary> {
                Ok(MapSummary {
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                    modified: row.try_get("modified")?,
                    width: get_u32(row, "width")?,
                    height: get_u32(row, "height")?,
                    resolution: row.try_get("resolution")?,
                    has_image: row.try_get("has_image")?,
                    has_pbstream: row.try_get("has_pbstream")?,
                    has_node_graph: row.try_get("has_node_graph")?,
                    has_area_tree: row.try_get("has_area_tree")?,
                    zone_count: row.try_get("zone_count")?,
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM maps")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
