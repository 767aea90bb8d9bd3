//! `mapctl export`: write a stored map back out as a map directory.
//!
//! The output uses the same file names [`load_bundle`](crate::loader::load_bundle)
//! reads, so an exported directory can be uploaded again as-is. Optional
//! blobs and graphs are written only when the record holds them; `zones.json`
//! is always written, as `[]` when the record has no zones.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::loader::{
    AREA_TREE_FILE, MAP_INFO_FILE, NODE_GRAPH_FILE, OCCUPANCY_GRID_FILE, PBSTREAM_FILE,
    ZONES_FILE,
};
use crate::models::MapRecord;
use crate::store::sqlite::SqliteMapStore;
use crate::store::MapStore;

pub async fn run_export(config: &Config, name: &str, dir: &Path) -> Result<()> {
    let store = SqliteMapStore::open(config).await?;
    let record = store.find_by_name(name).await?;
    store.close().await;

    let record = match record {
        Some(r) => r,
        None => bail!("map not found: {}", name),
    };

    let written = write_map_dir(&record, dir)?;

    println!("export {}", name);
    println!("  directory: {}", dir.display());
    println!("  files: {}", written.join(", "));
    println!("ok");
    Ok(())
}

/// Write `record` into `dir`, returning the file names written.
pub fn write_map_dir(record: &MapRecord, dir: &Path) -> Result<Vec<&'static str>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut written = vec![MAP_INFO_FILE];
    record
        .map_info()
        .write_json_file(&dir.join(MAP_INFO_FILE))?;

    if let Some(image) = &record.image {
        std::fs::write(dir.join(OCCUPANCY_GRID_FILE), image)?;
        written.push(OCCUPANCY_GRID_FILE);
    }
    if let Some(pbstream) = &record.pbstream {
        std::fs::write(dir.join(PBSTREAM_FILE), pbstream)?;
        written.push(PBSTREAM_FILE);
    }
    if let Some(graph) = &record.node_graph {
        std::fs::write(dir.join(NODE_GRAPH_FILE), graph)?;
        written.push(NODE_GRAPH_FILE);
    }
    if let Some(tree) = &record.area_tree {
        std::fs::write(dir.join(AREA_TREE_FILE), tree)?;
        written.push(AREA_TREE_FILE);
    }
    // A record always has a zone list, possibly empty. Writing `[]` keeps a
    // re-upload from leaving stale zones in place.
    std::fs::write(
        dir.join(ZONES_FILE),
        serde_json::to_string_pretty(&record.zones)?,
    )?;
    written.push(ZONES_FILE);

    Ok(written)
}
