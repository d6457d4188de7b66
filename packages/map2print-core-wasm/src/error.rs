//! Error types for the geometry pipeline.

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Errors surfaced by the pipeline stages and the collaborator layer.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed raster input (size mismatch, missing band).
    #[error("Invalid raster: {message}")]
    InvalidRaster { message: String },

    /// Unclosed, self-crossing or otherwise unusable ring.
    #[error("Invalid polygon: {message}")]
    InvalidPolygon { message: String },

    /// Normalization over an empty or non-finite value set.
    #[error("Degenerate height set: {message}")]
    DegenerateHeightSet { message: String },

    /// Building footprint shape the projector does not accept.
    #[error("Unsupported footprint at index {index}: {message}")]
    UnsupportedFootprint { index: usize, message: String },

    /// Extrusion height that is negative or not finite.
    #[error("Invalid height {value} for feature {index}")]
    InvalidHeight { index: usize, value: f64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure reported by a host fetch helper.
    #[error("Fetch failed: {0}")]
    Fetch(String),
}

impl PipelineError {
    pub fn invalid_raster(message: impl Into<String>) -> Self {
        Self::InvalidRaster {
            message: message.into(),
        }
    }

    pub fn invalid_polygon(message: impl Into<String>) -> Self {
        Self::InvalidPolygon {
            message: message.into(),
        }
    }

    pub fn degenerate_heights(message: impl Into<String>) -> Self {
        Self::DegenerateHeightSet {
            message: message.into(),
        }
    }

    pub fn unsupported_footprint(index: usize, message: impl Into<String>) -> Self {
        Self::UnsupportedFootprint {
            index,
            message: message.into(),
        }
    }
}

impl From<PipelineError> for JsValue {
    fn from(err: PipelineError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
