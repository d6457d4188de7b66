// Pipeline configuration. Every field has the application default, so hosts
// only send what they want to change.
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::extrude::{ExtrudeOptions, DEFAULT_SCALE};
use crate::footprint::HolePolicy;
use crate::frame::TERRAIN_PIXEL_DIMENSION;
use crate::normalize::{BUILDING_HEIGHT_MULTIPLIER, TERRAIN_HEIGHT_MULTIPLIER};
use crate::polygonize::Connectivity;

/// The terrain raster's elevation classes live in its second band.
pub const TERRAIN_BAND_INDEX: usize = 1;
/// Terrain is oriented for the printed model by a half turn.
pub const TERRAIN_ROTATION_DEGREES: f64 = 180.0;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub terrain_height_multiplier: f64,
    pub building_height_multiplier: f64,
    pub connectivity: Connectivity,
    pub band_index: usize,
    pub pixel_dimension: f64,
    pub rotate_degrees: f64,
    pub scale: [f64; 2],
    pub vertical_unit: f64,
    pub bottom_cap: bool,
    pub hole_policy: HolePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            terrain_height_multiplier: TERRAIN_HEIGHT_MULTIPLIER,
            building_height_multiplier: BUILDING_HEIGHT_MULTIPLIER,
            connectivity: Connectivity::default(),
            band_index: TERRAIN_BAND_INDEX,
            pixel_dimension: TERRAIN_PIXEL_DIMENSION,
            rotate_degrees: TERRAIN_ROTATION_DEGREES,
            scale: DEFAULT_SCALE,
            vertical_unit: 1.0,
            bottom_cap: true,
            hole_policy: HolePolicy::Reject,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON config; blank input means all defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(json)?)
    }

    pub fn extrude_options(&self) -> ExtrudeOptions {
        ExtrudeOptions {
            scale: self.scale,
            vertical_unit: self.vertical_unit,
            bottom_cap: self.bottom_cap,
        }
    }
}
