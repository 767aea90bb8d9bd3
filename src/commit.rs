//! Direct-to-database commit of a map bundle.
//!
//! Find-or-create by name, overwrite identity and geometry, replace every
//! artifact the bundle carries, and save once. Artifacts absent from the
//! bundle keep their stored values. The save is the only write; a failure
//! before it leaves the stored record unchanged.

use tracing::info;

use crate::artifact::Artifact;
use crate::clock::Clock;
use crate::error::UploadError;
use crate::loader::MapBundle;
use crate::models::{digest, MapRecord};
use crate::store::MapStore;
use crate::thumbnail;

pub async fn commit<S: MapStore + ?Sized>(
    store: &S,
    bundle: MapBundle,
    clock: &dyn Clock,
) -> Result<MapRecord, UploadError> {
    let MapBundle {
        map_info,
        occupancy_grid,
        pbstream,
        node_graph,
        area_tree,
        zones,
    } = bundle;

    let existing = store
        .find_by_name(&map_info.name)
        .await
        .map_err(UploadError::persistence)?;
    let mut record = match existing {
        Some(record) => {
            info!(
                "Map {} already exists in the database. Updating.",
                map_info.name
            );
            record
        }
        None => {
            info!("Map {} is new. Inserting.", map_info.name);
            MapRecord::new(&map_info)
        }
    };

    record.apply_map_info(&map_info, clock.now());

    if let Artifact::Present(grid) = occupancy_grid {
        let thumb = thumbnail::generate(&grid)?;
        info!(
            "Replacing occupancy grid ({} bytes, sha256 {}) and thumbnail ({} bytes)",
            grid.len(),
            digest(&grid),
            thumb.len()
        );
        record.image = Some(grid);
        record.thumbnail = Some(thumb);
    }

    if let Artifact::Present(bytes) = pbstream {
        record.pbstream = Some(bytes);
    }

    if let Artifact::Present(json) = node_graph {
        record.node_graph = Some(json);
    }
    if let Artifact::Present(json) = area_tree {
        record.area_tree = Some(json);
    }

    // `zones.json` holding `[]` clears the stored zones; no file keeps them.
    if let Artifact::Present(zones) = zones {
        record.zones = zones;
    }

    store
        .save(&record)
        .await
        .map_err(UploadError::persistence)?;
    info!("Saved map {} ({})", record.name, record.id);

    Ok(record)
}
