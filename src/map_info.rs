//! Map identity and grid metadata.
//!
//! A [`MapInfo`] is read from `map_info.json` at the start of an upload (or
//! decoded from an incoming [`MapInfoMsg`] on the service side) and is not
//! mutated afterwards.
//!
//! The JSON layout is:
//!
//! ```json
//! {
//!   "name": "warehouse",
//!   "description": "ground floor",
//!   "created": "2024-03-01T10:00:00Z",
//!   "modified": "2024-03-02T08:30:00Z",
//!   "meta_data": {
//!     "resolution": 0.05,
//!     "width": 2048,
//!     "height": 1024,
//!     "origin_x": -51.2,
//!     "origin_y": -25.6
//!   }
//! }
//! ```

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::clock::Clock;
use crate::error::MapInfoError;
use crate::msg::{MapInfoMsg, MapMetaDataMsg, PointMsg, PoseMsg, TimeMsg};

#[derive(Debug, Clone, PartialEq)]
pub struct MapInfo {
    pub name: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Meters per cell.
    pub resolution: f64,
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// World-frame position of cell (0, 0).
    pub origin_x: f64,
    pub origin_y: f64,
}

impl MapInfo {
    /// Build from a wire message.
    ///
    /// Stamps are truncated to whole seconds.
    pub fn from_message(msg: &MapInfoMsg) -> Result<Self, MapInfoError> {
        let meta = msg
            .meta_data
            .as_ref()
            .ok_or_else(|| MapInfoError::Decode("meta_data".to_string()))?;
        let created = stamp_to_utc(msg.created.as_ref(), "created")?;
        let modified = stamp_to_utc(msg.modified.as_ref(), "modified")?;

        let info = MapInfo {
            name: msg.name.clone(),
            description: msg.description.clone(),
            created,
            modified,
            resolution: meta.resolution,
            width: meta.width,
            height: meta.height,
            origin_x: meta.origin.position.x,
            origin_y: meta.origin.position.y,
        };
        info.validate()?;
        Ok(info)
    }

    /// Build from a parsed `map_info.json` document.
    pub fn from_mapping(value: &Value) -> Result<Self, MapInfoError> {
        let root = value
            .as_object()
            .ok_or_else(|| MapInfoError::Decode("expected a JSON object".to_string()))?;
        let meta = root
            .get("meta_data")
            .and_then(Value::as_object)
            .ok_or_else(|| MapInfoError::Decode("meta_data".to_string()))?;

        let info = MapInfo {
            name: get_str(root, "name")?,
            description: get_str(root, "description")?,
            created: parse_timestamp(&get_str(root, "created")?)?,
            modified: parse_timestamp(&get_str(root, "modified")?)?,
            resolution: get_f64(meta, "meta_data.resolution", "resolution")?,
            width: get_u32(meta, "meta_data.width", "width")?,
            height: get_u32(meta, "meta_data.height", "height")?,
            origin_x: get_f64(meta, "meta_data.origin_x", "origin_x")?,
            origin_y: get_f64(meta, "meta_data.origin_y", "origin_y")?,
        };
        info.validate()?;
        Ok(info)
    }

    /// Convert to a wire message.
    ///
    /// Both `created` and `modified` are stamped with `clock.now()`; the
    /// stored provenance of this value is not carried over.
    pub fn to_message(&self, clock: &dyn Clock) -> MapInfoMsg {
        let now = TimeMsg::from(clock.now());
        MapInfoMsg {
            name: self.name.clone(),
            description: self.description.clone(),
            created: Some(now),
            modified: Some(now),
            meta_data: Some(MapMetaDataMsg {
                resolution: self.resolution,
                width: self.width,
                height: self.height,
                origin: PoseMsg {
                    position: PointMsg {
                        x: self.origin_x,
                        y: self.origin_y,
                        z: 0.0,
                    },
                    ..PoseMsg::default()
                },
            }),
        }
    }

    pub fn to_mapping(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "created": format_timestamp(&self.created),
            "modified": format_timestamp(&self.modified),
            "meta_data": {
                "resolution": self.resolution,
                "width": self.width,
                "height": self.height,
                "origin_x": self.origin_x,
                "origin_y": self.origin_y,
            }
        })
    }

    pub fn to_json_string(&self) -> String {
        self.to_mapping().to_string()
    }

    pub fn read_json_file(path: &Path) -> Result<Self, MapInfoError> {
        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        Self::from_mapping(&value)
    }

    /// Write as pretty-printed JSON, truncating any existing file.
    pub fn write_json_file(&self, path: &Path) -> Result<(), MapInfoError> {
        let content = serde_json::to_string_pretty(&self.to_mapping())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check `name` is non-empty and the grid geometry is positive.
    pub fn validate(&self) -> Result<(), MapInfoError> {
        if self.name.trim().is_empty() {
            return Err(MapInfoError::Invalid("name must not be empty".to_string()));
        }
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(MapInfoError::Invalid(format!(
                "resolution must be > 0, got {}",
                self.resolution
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(MapInfoError::Invalid(format!(
                "width and height must be > 0, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.origin_x.is_finite() && self.origin_y.is_finite()) {
            return Err(MapInfoError::Invalid("origin must be finite".to_string()));
        }
        Ok(())
    }
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with an offset, and naive date-times (with `T` or a
/// space separator, optional fractional seconds) which are read as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, MapInfoError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(MapInfoError::Format {
        value: s.to_string(),
        reason: "expected ISO-8601 date-time".to_string(),
    })
}

pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn stamp_to_utc(stamp: Option<&TimeMsg>, field: &str) -> Result<DateTime<Utc>, MapInfoError> {
    let stamp = stamp.ok_or_else(|| MapInfoError::Decode(field.to_string()))?;
    DateTime::from_timestamp(stamp.sec, 0)
        .ok_or_else(|| MapInfoError::Decode(format!("{} out of range: {}", field, stamp.sec)))
}

fn get_str(obj: &Map<String, Value>, key: &str) -> Result<String, MapInfoError> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| MapInfoError::Decode(key.to_string()))
}

fn get_f64(obj: &Map<String, Value>, path: &str, key: &str) -> Result<f64, MapInfoError> {
    obj.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| MapInfoError::Decode(path.to_string()))
}

fn get_u32(obj: &Map<String, Value>, path: &str, key: &str) -> Result<u32, MapInfoError> {
    obj.get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| MapInfoError::Decode(path.to_string()))
}
