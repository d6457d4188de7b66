// Utility functions to generate consistent cache keys across the application.
use crate::config::PipelineConfig;
use crate::error::Result;

/// Content key for a terrain request: "lat_lng_radius".
/// Identical requests map to the same key; any change to the centre or
/// radius gives a new one.
pub fn make_tile_key(lat: f64, lng: f64, radius: f64) -> String {
    format!("{}_{}_{}", lat, lng, radius)
}

/// Key for terrain features derived from a tile. The config is part of the
/// key so a cached set is only reused for an identical conversion.
pub fn make_feature_key(tile_key: &str, config: &PipelineConfig) -> Result<String> {
    Ok(format!("{}_{}", tile_key, serde_json::to_string(config)?))
}
