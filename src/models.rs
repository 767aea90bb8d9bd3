//! Stored map records.
//!
//! A [`MapRecord`] is the database-side form of one map. Records are keyed
//! by `name`; at most one record exists per name.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::map_info::MapInfo;
use crate::zone::Zone;

/// A map as persisted in the map store.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub resolution: f64,
    pub width: u32,
    pub height: u32,
    pub origin_x: f64,
    pub origin_y: f64,
    /// PNG-encoded occupancy grid.
    pub image: Option<Vec<u8>>,
    /// PNM thumbnail derived from `image`.
    pub thumbnail: Option<Vec<u8>>,
    pub pbstream: Option<Vec<u8>>,
    pub node_graph: Option<String>,
    pub area_tree: Option<String>,
    pub zones: Vec<Zone>,
}

impl MapRecord {
    /// A fresh record that has not been saved yet.
    pub fn new(info: &MapInfo) -> Self {
        MapRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: info.name.clone(),
            description: info.description.clone(),
            created: info.created,
            modified: info.modified,
            resolution: info.resolution,
            width: info.width,
            height: info.height,
            origin_x: info.origin_x,
            origin_y: info.origin_y,
            image: None,
            thumbnail: None,
            pbstream: None,
            node_graph: None,
            area_tree: None,
            zones: Vec::new(),
        }
    }

    /// Overwrite identity and geometry from `info`; `modified` is set to `now`.
    pub fn apply_map_info(&mut self, info: &MapInfo, now: DateTime<Utc>) {
        self.name = info.name.clone();
        self.description = info.description.clone();
        self.modified = now;
        self.resolution = info.resolution;
        self.width = info.width;
        self.height = info.height;
        self.origin_x = info.origin_x;
        self.origin_y = info.origin_y;
    }

    pub fn map_info(&self) -> MapInfo {
        MapInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            created: self.created,
            modified: self.modified,
            resolution: self.resolution,
            width: self.width,
            height: self.height,
            origin_x: self.origin_x,
            origin_y: self.origin_y,
        }
    }
}

/// Listing row: metadata and which artifacts a stored map carries.
#[derive(Debug, Clone)]
pub struct MapSummary {
    pub name: String,
    pub description: String,
    pub modified: i64,
    pub width: u32,
    pub height: u32,
    pub resolution: f64,
    pub has_image: bool,
    pub has_pbstream: bool,
    pub has_node_graph: bool,
    pub has_area_tree: bool,
    pub zone_count: i64,
}

/// Hex SHA-256 of a blob, used to identify uploaded payloads in logs.
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
