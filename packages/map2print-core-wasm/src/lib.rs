use wasm_bindgen::prelude::*;
use geo_types::Coord;
use serde_wasm_bindgen::to_value;

// Create a console module for logging
pub mod console;
pub mod error;
pub mod models;
pub mod config;
// Raster input and polygonization
pub mod raster;
pub mod polygonize;
pub mod normalize;
pub mod frame;
pub mod ring_validation;
pub mod footprint;
// Import our geojson features module
pub mod geojson_features;
// Import our geometry functions
#[path = "../geometry_functions/extrude.rs"]
pub mod extrude;
pub mod export_obj;
pub mod pipeline;
// Cache state and acquisition through the host
mod module_state;
mod cache_keys;
pub mod services;

use config::PipelineConfig;
use error::PipelineError;
use geojson_features::{parse_feature_set, FeatureCollection};
use models::{BuildingFootprint, CacheStats, FeatureSet};
use module_state::ModuleState;
use polygonize::Connectivity;
use raster::RasterBand;

// Enable better panic messages in console during development
#[cfg(feature = "console_error_panic_hook")]
pub use console_error_panic_hook::set_once as set_panic_hook;

#[wasm_bindgen]
extern "C" {
    // JavaScript function to fetch and decode an image from URL
    #[wasm_bindgen(js_namespace = wasmJsHelpers, catch)]
    pub fn fetch(url: &str) -> Result<js_sys::Promise, JsValue>;
}

// Use the macros from our console module
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => ($crate::console::log(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_warn {
    ($($t:tt)*) => ($crate::console::warn(&format!($($t)*)))
}

use std::sync::Once;
static INIT: Once = Once::new();

// This sets up the wasm_bindgen start functionality
#[wasm_bindgen(start)]
pub fn start() {
    INIT.call_once(|| {
        // Set the panic hook for better error messages
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        console_log!("WASM module initialized successfully");
    });
}

fn config_from(config_json: Option<String>) -> Result<PipelineConfig, PipelineError> {
    PipelineConfig::from_json(config_json.as_deref().unwrap_or(""))
}

fn to_json(set: &FeatureSet) -> Result<String, PipelineError> {
    Ok(serde_json::to_string(&FeatureCollection::from_feature_set(set))?)
}

/// Polygonize a single-band raster of `width * height` values.
/// `connectivity` is 4 or 8. Returns a FeatureCollection JSON string.
#[wasm_bindgen]
pub fn polygonize_raster(width: usize, height: usize, values: &[f64], connectivity: u8) -> Result<String, JsValue> {
    let connectivity = Connectivity::try_from(connectivity).map_err(|e| JsValue::from_str(&e))?;
    let band = RasterBand::new(width, height, values.to_vec())?;
    Ok(to_json(&polygonize::polygonize(&band, connectivity))?)
}

/// Terrain branch for an image the host already decoded.
#[wasm_bindgen]
pub fn process_terrain_image(
    width: usize,
    height: usize,
    channels: usize,
    pixels: &[u8],
    lat: f64,
    lng: f64,
    radius: f64,
    config_json: Option<String>,
) -> Result<String, JsValue> {
    let config = config_from(config_json)?;
    let center = Coord { x: lng, y: lat };
    let set = pipeline::terrain_features_from_image(width, height, channels, pixels, center, radius, &config)?;
    Ok(to_json(&set)?)
}

/// Building branch for a JSON array of building records.
#[wasm_bindgen]
pub fn process_buildings(buildings_json: &str, config_json: Option<String>) -> Result<String, JsValue> {
    let config = config_from(config_json)?;
    let buildings: Vec<BuildingFootprint> =
        serde_json::from_str(buildings_json).map_err(PipelineError::from)?;
    let set = pipeline::building_features(buildings, &config)?;
    Ok(to_json(&set)?)
}

#[wasm_bindgen]
pub fn combine_feature_collections(first_json: &str, second_json: &str) -> Result<String, JsValue> {
    let first = parse_feature_set(first_json)?;
    let second = parse_feature_set(second_json)?;
    Ok(to_json(&pipeline::combine_features(first, second))?)
}

/// Extrude a feature collection (or bare feature array) and return OBJ text.
#[wasm_bindgen]
pub fn generate_obj(features_json: &str, config_json: Option<String>) -> Result<String, JsValue> {
    let config = config_from(config_json)?;
    let set = parse_feature_set(features_json)?;
    Ok(pipeline::features_to_obj(&set, &config)?)
}

// Function to get cache statistics
#[wasm_bindgen]
pub fn get_cache_stats() -> Result<JsValue, JsValue> {
    let stats = ModuleState::with(|state| {
        let (raster_count, feature_count, max_raster, total_requests) = state.get_stats();
        let hit_rate = if total_requests > 0 {
            state.cache_hits as f64 / total_requests as f64
        } else {
            0.0
        };
        CacheStats {
            raster_tiles_count: raster_count,
            terrain_feature_sets_count: feature_count,
            max_raster_tiles: max_raster,
            total_requests,
            hit_rate,
        }
    });

    Ok(to_value(&stats)?)
}

// Function to clear all caches
#[wasm_bindgen]
pub fn clear_caches() -> bool {
    ModuleState::with_mut(|state| state.clear_all_caches());
    true
}
