//! `mapctl list`: what the map database holds.

use anyhow::Result;

use crate::config::Config;
use crate::store::sqlite::SqliteMapStore;
use crate::store::MapStore;

pub async fn run_list(config: &Config) -> Result<()> {
    let store = SqliteMapStore::open(config).await?;
    let maps = store.list().await?;
    store.close().await;

    if maps.is_empty() {
        println!("No maps stored in {}", config.db.path.display());
        return Ok(());
    }

    println!(
        "{:<24} {:>11} {:>8} {:<17} {}",
        "NAME", "CELLS", "M/CELL", "MODIFIED", "ARTIFACTS"
    );
    println!("{}", "-".repeat(80));

    for m in &maps {
        let mut artifacts = Vec::new();
        if m.has_image {
            artifacts.push("grid".to_string());
        }
        if m.has_pbstream {
            artifacts.push("pbstream".to_string());
        }
        if m.has_node_graph {
            artifacts.push("node_graph".to_string());
        }
        if m.has_area_tree {
            artifacts.push("area_tree".to_string());
        }
        if m.zone_count > 0 {
            artifacts.push(format!("zones({})", m.zone_count));
        }

        println!(
            "{:<24} {:>11} {:>8} {:<17} {}",
            m.name,
            format!("{}x{}", m.width, m.height),
            m.resolution,
            format_ts(m.modified),
            if artifacts.is_empty() {
                "-".to_string()
            } else {
                artifacts.join(", ")
            }
        );
    }

    Ok(())
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
