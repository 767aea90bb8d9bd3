//! Named polygonal regions of a map.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::msg::{PointMsg, ZoneMsg};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub polygon: Vec<Point2>,
}

impl Zone {
    pub fn to_msg(&self) -> ZoneMsg {
        ZoneMsg {
            name: self.name.clone(),
            polygon: self
                .polygon
                .iter()
                .map(|p| PointMsg {
                    x: p.x,
                    y: p.y,
                    z: 0.0,
                })
                .collect(),
        }
    }

    pub fn from_msg(msg: &ZoneMsg) -> Result<Self, GraphError> {
        let zone = Zone {
            name: msg.name.clone(),
            polygon: msg
                .polygon
                .iter()
                .map(|p| Point2 { x: p.x, y: p.y })
                .collect(),
        };
        zone.validate()?;
        Ok(zone)
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        if self.name.is_empty() {
            return Err(GraphError::Invalid("zone with empty name".to_string()));
        }
        if self.polygon.len() < 3 {
            return Err(GraphError::Invalid(format!(
                "zone '{}' has {} vertices, need at least 3",
                self.name,
                self.polygon.len()
            )));
        }
        if self.polygon.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(GraphError::Invalid(format!(
                "zone '{}' has a non-finite vertex",
                self.name
            )));
        }
        Ok(())
    }
}

/// Parse a JSON array of zones.
pub fn zones_from_json(s: &str) -> Result<Vec<Zone>, GraphError> {
    let zones: Vec<Zone> = serde_json::from_str(s)?;
    for zone in &zones {
        zone.validate()?;
    }
    Ok(zones)
}

pub fn read_zones(path: &Path) -> Result<Vec<Zone>, GraphError> {
    let content = std::fs::read_to_string(path)?;
    zones_from_json(&content)
}
