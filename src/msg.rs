//! Wire messages exchanged with the map service.
//!
//! These mirror the map service's `AddMap` request/response pair. They are
//! carried as JSON over HTTP; binary payloads are base64-encoded strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A timestamp split into whole seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeMsg {
    pub sec: i64,
    #[serde(default)]
    pub nanosec: u32,
}

impl From<DateTime<Utc>> for TimeMsg {
    fn from(t: DateTime<Utc>) -> Self {
        TimeMsg {
            sec: t.timestamp(),
            nanosec: t.timestamp_subsec_nanos(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointMsg {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuaternionMsg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for QuaternionMsg {
    fn default() -> Self {
        QuaternionMsg {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseMsg {
    pub position: PointMsg,
    #[serde(default)]
    pub orientation: QuaternionMsg,
}

/// Grid geometry, laid out like a navigation map's metadata block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapMetaDataMsg {
    pub resolution: f64,
    pub width: u32,
    pub height: u32,
    pub origin: PoseMsg,
}

/// Map identity and geometry.
///
/// Stamps and metadata are optional on the wire so that a sender omitting
/// them is rejected by [`MapInfo::from_message`](crate::map_info::MapInfo::from_message)
/// with a decode error naming the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInfoMsg {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<TimeMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<TimeMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<MapMetaDataMsg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneMsg {
    pub name: String,
    pub polygon: Vec<PointMsg>,
}

/// An encoded raster tagged with its codec.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompressedImage {
    pub format: String,
    #[serde(with = "base64_bytes", default)]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddMapRequest {
    pub map_info: MapInfoMsg,
    #[serde(default)]
    pub node_graph: String,
    #[serde(default)]
    pub area_tree: String,
    #[serde(default)]
    pub zones: Vec<ZoneMsg>,
    #[serde(default)]
    pub occupancy_grid: CompressedImage,
    #[serde(with = "base64_opt_bytes", default)]
    pub pbstream: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddMapResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl AddMapResponse {
    pub fn ok() -> Self {
        AddMapResponse {
            success: true,
            message: String::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        AddMapResponse {
            success: false,
            message: message.into(),
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

mod base64_opt_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|e| STANDARD.decode(e.as_bytes()))
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
