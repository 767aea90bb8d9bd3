//! Map directory loading.
//!
//! A map directory holds up to six artifacts with fixed file names. Only
//! `map_info.json` is mandatory; every other file may be missing, in which
//! case the matching bundle slot is [`Artifact::Absent`]. A file that is
//! present but fails to parse aborts the load, so an inconsistent map is
//! never uploaded.
//!
//! | File | Slot |
//! |------|------|
//! | `map_info.json` | [`MapBundle::map_info`] |
//! | `occupancy_grid.png` | [`MapBundle::occupancy_grid`] |
//! | `cartographer_map.pbstream` | [`MapBundle::pbstream`] |
//! | `node_graph.json` | [`MapBundle::node_graph`] |
//! | `area_tree.json` | [`MapBundle::area_tree`] |
//! | `zones.json` | [`MapBundle::zones`] |

use std::io::{Cursor, ErrorKind};
use std::path::Path;

use image::{ImageFormat, ImageReader};
use tracing::{debug, error, info, warn};

use crate::artifact::Artifact;
use crate::error::{MapInfoError, UploadError};
use crate::graph::{AreaTree, NodeGraph};
use crate::map_info::MapInfo;
use crate::models::digest;
use crate::zone::{self, Zone};

pub const MAP_INFO_FILE: &str = "map_info.json";
pub const OCCUPANCY_GRID_FILE: &str = "occupancy_grid.png";
pub const PBSTREAM_FILE: &str = "cartographer_map.pbstream";
pub const NODE_GRAPH_FILE: &str = "node_graph.json";
pub const AREA_TREE_FILE: &str = "area_tree.json";
pub const ZONES_FILE: &str = "zones.json";

/// Everything one upload carries.
#[derive(Debug, Clone, PartialEq)]
pub struct MapBundle {
    pub map_info: MapInfo,
    /// PNG bytes.
    pub occupancy_grid: Artifact<Vec<u8>>,
    pub pbstream: Artifact<Vec<u8>>,
    /// Validated node graph, serialized.
    pub node_graph: Artifact<String>,
    /// Validated area tree, serialized.
    pub area_tree: Artifact<String>,
    pub zones: Artifact<Vec<Zone>>,
}

impl MapBundle {
    /// A bundle holding only map metadata.
    pub fn new(map_info: MapInfo) -> Self {
        MapBundle {
            map_info,
            occupancy_grid: Artifact::Absent,
            pbstream: Artifact::Absent,
            node_graph: Artifact::Absent,
            area_tree: Artifact::Absent,
            zones: Artifact::Absent,
        }
    }

    /// File names of the optional artifacts that were found.
    pub fn present_files(&self) -> Vec<&'static str> {
        let mut files = Vec::new();
        if self.occupancy_grid.is_present() {
            files.push(OCCUPANCY_GRID_FILE);
        }
        if self.pbstream.is_present() {
            files.push(PBSTREAM_FILE);
        }
        if self.node_graph.is_present() {
            files.push(NODE_GRAPH_FILE);
        }
        if self.area_tree.is_present() {
            files.push(AREA_TREE_FILE);
        }
        if self.zones.is_present() {
            files.push(ZONES_FILE);
        }
        files
    }
}

/// Load and validate every artifact in `dir`.
///
/// Performs file-system reads only.
pub fn load_bundle(dir: &Path) -> Result<MapBundle, UploadError> {
    if !dir.is_dir() {
        error!("Map directory {} does not exist", dir.display());
        return Err(UploadError::NotADirectory(dir.to_path_buf()));
    }

    let map_info_path = dir.join(MAP_INFO_FILE);
    if !map_info_path.is_file() {
        error!("Mandatory file \"{}\" not found. Quitting.", MAP_INFO_FILE);
        return Err(UploadError::MissingMandatoryArtifact {
            file: MAP_INFO_FILE,
            dir: dir.to_path_buf(),
        });
    }
    let map_info = MapInfo::read_json_file(&map_info_path).map_err(|e| match e {
        MapInfoError::Io(source) => {
            error!("Failed to read \"{}\": {}", MAP_INFO_FILE, source);
            UploadError::ArtifactRead {
                file: MAP_INFO_FILE,
                source,
            }
        }
        other => parse_failure(MAP_INFO_FILE, other),
    })?;
    info!("Found \"{}\" with map name: {}", MAP_INFO_FILE, map_info.name);

    let occupancy_grid = match read_optional(dir, OCCUPANCY_GRID_FILE)? {
        Some(bytes) => {
            check_grid(&bytes, &map_info)?;
            Artifact::Present(bytes)
        }
        None => missing(OCCUPANCY_GRID_FILE),
    };

    let pbstream = match read_optional(dir, PBSTREAM_FILE)? {
        Some(bytes) => {
            info!(
                "Found \"{}\" ({} bytes, sha256 {})",
                PBSTREAM_FILE,
                bytes.len(),
                digest(&bytes)
            );
            Artifact::Present(bytes)
        }
        None => missing(PBSTREAM_FILE),
    };

    let node_graph = if dir.join(NODE_GRAPH_FILE).exists() {
        let graph = NodeGraph::read_graph(&dir.join(NODE_GRAPH_FILE))
            .map_err(|e| parse_failure(NODE_GRAPH_FILE, e))?;
        info!(
            "Found \"{}\" with {} nodes",
            NODE_GRAPH_FILE,
            graph.node_count()
        );
        Artifact::Present(
            graph
                .to_json()
                .map_err(|e| parse_failure(NODE_GRAPH_FILE, e))?,
        )
    } else {
        missing(NODE_GRAPH_FILE)
    };

    let area_tree = if dir.join(AREA_TREE_FILE).exists() {
        let tree = AreaTree::read_graph(&dir.join(AREA_TREE_FILE))
            .map_err(|e| parse_failure(AREA_TREE_FILE, e))?;
        info!(
            "Found \"{}\" with {} areas",
            AREA_TREE_FILE,
            tree.areas_at_level(1).len()
        );
        Artifact::Present(
            tree.to_json()
                .map_err(|e| parse_failure(AREA_TREE_FILE, e))?,
        )
    } else {
        missing(AREA_TREE_FILE)
    };

    let zones = if dir.join(ZONES_FILE).exists() {
        let zones =
            zone::read_zones(&dir.join(ZONES_FILE)).map_err(|e| parse_failure(ZONES_FILE, e))?;
        info!("Found \"{}\" with {} zones", ZONES_FILE, zones.len());
        Artifact::Present(zones)
    } else {
        missing(ZONES_FILE)
    };

    Ok(MapBundle {
        map_info,
        occupancy_grid,
        pbstream,
        node_graph,
        area_tree,
        zones,
    })
}

fn read_optional(dir: &Path, file: &'static str) -> Result<Option<Vec<u8>>, UploadError> {
    match std::fs::read(dir.join(file)) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => {
            error!("Failed to read \"{}\": {}", file, e);
            Err(UploadError::ArtifactRead { file, source: e })
        }
    }
}

fn missing<T>(file: &str) -> Artifact<T> {
    warn!("\"{}\" not found", file);
    Artifact::Absent
}

fn parse_failure(file: &'static str, err: impl std::fmt::Display) -> UploadError {
    error!("\"{}\" is invalid: {}", file, err);
    UploadError::parse(file, err)
}

/// The grid must be a PNG; a size that disagrees with the metadata is
/// suspicious but not fatal.
fn check_grid(bytes: &[u8], map_info: &MapInfo) -> Result<(), UploadError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| parse_failure(OCCUPANCY_GRID_FILE, e))?;
    if reader.format() != Some(ImageFormat::Png) {
        return Err(parse_failure(OCCUPANCY_GRID_FILE, "not a PNG image"));
    }
    let (w, h) = reader
        .into_dimensions()
        .map_err(|e| parse_failure(OCCUPANCY_GRID_FILE, e))?;
    if (w, h) != (map_info.width, map_info.height) {
        warn!(
            "\"{}\" is {}x{} but map_info.json declares {}x{}",
            OCCUPANCY_GRID_FILE, w, h, map_info.width, map_info.height
        );
    }
    debug!("Found \"{}\" ({}x{}, {} bytes)", OCCUPANCY_GRID_FILE, w, h, bytes.len());
    Ok(())
}
