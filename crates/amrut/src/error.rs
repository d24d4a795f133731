//! Error types for the AMRUT library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for AMRUT operations.
#[derive(Debug, Error)]
pub enum AmrutError {
    /// The file is not a readable zip archive.
    #[error("'{path}' is not a valid AMRUT archive: {message}")]
    InvalidArchive { path: PathBuf, message: String },

    /// The archive does not contain `metadata.json`.
    #[error("the archive does not contain 'metadata.json'")]
    MissingMetadata,

    /// `metadata.json` could not be parsed or is missing required fields.
    #[error("failed to parse metadata.json: {0}")]
    MalformedMetadata(String),

    /// A declared layer has no corresponding GeoJSON entry, or the
    /// authoritative layer could not be found.
    #[error("layer '{0}' not found")]
    MissingLayer(String),

    /// Empty or invalid geometry encountered during diffing.
    #[error("geometry error: {0}")]
    GeometryError(String),

    /// Temp-zip build or atomic rename failed. The original archive is
    /// left untouched.
    #[error("failed to write archive '{path}': {message}")]
    WriteFailure { path: PathBuf, message: String },

    /// A feature in the layer carries no integer `feature_id` attribute.
    #[error("feature in layer '{layer}' has no 'feature_id' attribute")]
    MissingFeatureId { layer: String },

    /// Two features share a `feature_id` where uniqueness is required.
    #[error("duplicate feature_id {id} in layer '{layer}'")]
    DuplicateFeatureId { layer: String, id: i64 },

    /// A review session operation was attempted in the wrong state.
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// A background worker terminated abnormally.
    #[error("background worker failed: {0}")]
    Worker(String),

    /// Error reading or accessing a file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from the zip library.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Error parsing GeoJSON content.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

/// Result type alias for AMRUT operations.
pub type Result<T> = std::result::Result<T, AmrutError>;
