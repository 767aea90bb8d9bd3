//! Error types for map loading, dispatch, and persistence.
//!
//! Every variant of [`UploadError`] is fatal to an upload run. Nothing in
//! the pipeline retries; the operator re-invokes the upload wholesale.

use std::path::PathBuf;

use thiserror::Error;

/// Failure converting a [`MapInfo`](crate::map_info::MapInfo) from one of its
/// serialized forms.
#[derive(Debug, Error)]
pub enum MapInfoError {
    /// A required key or message field is missing or has the wrong type.
    #[error("missing or invalid field: {0}")]
    Decode(String),

    /// A timestamp is not valid ISO-8601.
    #[error("malformed timestamp '{value}': {reason}")]
    Format { value: String, reason: String },

    /// The decoded values break the geometry invariants.
    #[error("invalid map info: {0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failure parsing or validating a node graph, area tree, or zone list.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Failure of an upload run.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("map directory does not exist or is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("mandatory file \"{file}\" not found in {}", dir.display())]
    MissingMandatoryArtifact { file: &'static str, dir: PathBuf },

    #[error("failed to read \"{file}\": {source}")]
    ArtifactRead {
        file: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse \"{file}\": {reason}")]
    ArtifactParse { file: &'static str, reason: String },

    #[error("map service '{service}' unavailable: {reason}")]
    RemoteUnavailable { service: String, reason: String },

    #[error("failed to save map: {0}")]
    RemoteRejected(String),

    #[error("map service transport error: {0}")]
    Transport(String),

    #[error("failed to persist map: {0}")]
    Persistence(String),

    #[error("failed to generate thumbnail: {0}")]
    Thumbnail(#[from] image::ImageError),
}

impl UploadError {
    pub(crate) fn parse(file: &'static str, reason: impl ToString) -> Self {
        UploadError::ArtifactParse {
            file,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn persistence(err: anyhow::Error) -> Self {
        UploadError::Persistence(format!("{:#}", err))
    }
}
