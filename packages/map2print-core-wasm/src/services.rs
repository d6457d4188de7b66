// Terrain and building acquisition. The host page supplies the network
// through `wasmJsHelpers`; everything here only builds requests, awaits
// them one at a time and hands the results to the pipeline.
use geo_types::Coord;
use js_sys::Uint8Array;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::cache_keys::{make_feature_key, make_tile_key};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::fetch;
use crate::footprint::project_footprints;
use crate::frame::metres_to_degrees;
use crate::geojson_features::{BuildingsResponseData, FeatureCollection, TerrainResponseData};
use crate::models::{BuildingFootprint, FeatureSet};
use crate::module_state::{ModuleState, RasterTile};
use crate::pipeline::{building_features, terrain_features_from_image};
use crate::console_log;

/// Terrain is requested a little wider than the print so rotation never
/// exposes the tile edge.
pub const TERRAIN_RADIUS_PADDING: f64 = 1.2;
pub const DEFAULT_BUILDING_SEARCH_RADIUS: f64 = 300.0;
pub const DEFAULT_BUILDINGS_PER_PAGE: u32 = 100;

#[wasm_bindgen]
extern "C" {
    // Resolves to the response body as a string
    #[wasm_bindgen(js_namespace = wasmJsHelpers, js_name = fetchJson, catch)]
    fn fetch_json(url: &str) -> std::result::Result<js_sys::Promise, JsValue>;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TerrainRequest {
    pub lat: f64,
    pub lng: f64,
    pub radius: f64,
    /// Prefix the bounding box is appended to
    pub terrain_url: String,
    #[serde(default)]
    pub config: PipelineConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildingsRequest {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub service_url: String,
    #[serde(default = "default_search_radius")]
    pub radius: f64,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Building records used instead of the remote service
    #[serde(default)]
    pub fixture: Option<Vec<BuildingFootprint>>,
    /// Fixture records are projected as recorded unless this is set
    #[serde(default)]
    pub normalize_fixture: bool,
    #[serde(default)]
    pub config: PipelineConfig,
}

fn default_search_radius() -> f64 {
    DEFAULT_BUILDING_SEARCH_RADIUS
}

fn default_per_page() -> u32 {
    DEFAULT_BUILDINGS_PER_PAGE
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BuildingId {
    building_id: String,
}

/// Search response of the buildings service.
#[derive(Deserialize, Debug)]
struct BuildingSearchResponse {
    data: Vec<BuildingId>,
}

/// `"ne_lon,ne_lat,sw_lon,sw_lat"` around `center`, offset by `radius`
/// metres converted to degrees on both axes.
pub fn terrain_bbox(center: Coord<f64>, radius: f64) -> String {
    let d = metres_to_degrees(radius);
    format!(
        "{},{},{},{}",
        center.x + d,
        center.y + d,
        center.x - d,
        center.y - d
    )
}

pub fn terrain_request_url(base_url: &str, center: Coord<f64>, radius: f64) -> String {
    format!("{}{}", base_url, terrain_bbox(center, radius))
}

pub fn buildings_search_url(base_url: &str, lat: f64, lng: f64, radius: f64, per_page: u32) -> String {
    format!(
        "{}/buildings?latLong={},{}&radius={}&perPage={}",
        base_url, lat, lng, radius, per_page
    )
}

pub fn building_detail_url(base_url: &str, building_id: &str) -> String {
    format!(
        "{}/buildings/{}?include=footprint3d,averageEaveHeight",
        base_url, building_id
    )
}

fn js_error(err: JsValue) -> PipelineError {
    PipelineError::Fetch(err.as_string().unwrap_or_else(|| format!("{:?}", err)))
}

/// Image sizes from the host must be non-negative whole numbers.
fn image_dimension(value: Option<f64>, field: &str) -> Result<usize> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= usize::MAX as f64 => Ok(v as usize),
        Some(v) => Err(PipelineError::Fetch(format!("Invalid {}: {}", field, v))),
        None => Err(PipelineError::Fetch(format!("Invalid {}: not a number", field))),
    }
}

fn js_number(obj: &JsValue, field: &str) -> Result<usize> {
    let value = js_sys::Reflect::get(obj, &JsValue::from_str(field)).map_err(js_error)?;
    image_dimension(value.as_f64(), field)
}

async fn fetch_raster(url: &str) -> Result<RasterTile> {
    let promise = fetch(url).map_err(js_error)?;
    let js_result = JsFuture::from(promise).await.map_err(js_error)?;

    let width = js_number(&js_result, "width")?;
    let height = js_number(&js_result, "height")?;
    let pixel_data_js =
        js_sys::Reflect::get(&js_result, &JsValue::from_str("pixelData")).map_err(js_error)?;
    let pixels = Uint8Array::new(&pixel_data_js).to_vec();

    // Browser image decoding always yields RGBA
    Ok(RasterTile {
        width,
        height,
        channels: 4,
        pixels,
    })
}

async fn fetch_json_text(url: &str) -> Result<String> {
    let promise = fetch_json(url).map_err(js_error)?;
    let body = JsFuture::from(promise).await.map_err(js_error)?;
    body.as_string()
        .ok_or_else(|| PipelineError::Fetch(format!("{} did not return text", url)))
}

/// Terrain features for a request, served from the cache when the same
/// centre, radius and config were converted before.
pub async fn load_terrain(request: &TerrainRequest) -> Result<FeatureSet> {
    let radius = request.radius * TERRAIN_RADIUS_PADDING;
    let center = Coord {
        x: request.lng,
        y: request.lat,
    };
    let tile_key = make_tile_key(request.lat, request.lng, radius);
    let feature_key = make_feature_key(&tile_key, &request.config)?;

    if let Some(cached) = ModuleState::with_mut(|state| state.get_terrain_features(&feature_key).cloned()) {
        console_log!("Terrain cache hit for {}", tile_key);
        return Ok(cached);
    }

    let tile = match ModuleState::with_mut(|state| state.get_raster_tile(&tile_key).cloned()) {
        Some(tile) => tile,
        None => {
            let url = terrain_request_url(&request.terrain_url, center, radius);
            console_log!("Fetching terrain raster {}", url);
            let tile = fetch_raster(&url).await?;
            ModuleState::with_mut(|state| state.add_raster_tile(tile_key.clone(), tile.clone()));
            tile
        }
    };

    let features = terrain_features_from_image(
        tile.width,
        tile.height,
        tile.channels,
        &tile.pixels,
        center,
        radius,
        &request.config,
    )?;
    ModuleState::with_mut(|state| state.add_terrain_features(feature_key, features.clone()));
    Ok(features)
}

/// Building records near a point: one search, then each record in turn.
pub async fn load_building_records(request: &BuildingsRequest) -> Result<Vec<BuildingFootprint>> {
    if let Some(fixture) = &request.fixture {
        console_log!("Using {} fixture buildings", fixture.len());
        return Ok(fixture.clone());
    }

    let search_url = buildings_search_url(
        &request.service_url,
        request.lat,
        request.lng,
        request.radius,
        request.per_page,
    );
    let search: BuildingSearchResponse = serde_json::from_str(&fetch_json_text(&search_url).await?)?;

    let mut buildings = Vec::with_capacity(search.data.len());
    for BuildingId { building_id } in &search.data {
        let body = fetch_json_text(&building_detail_url(&request.service_url, building_id)).await?;
        buildings.push(serde_json::from_str(&body)?);
    }
    console_log!("Fetched {} buildings", buildings.len());
    Ok(buildings)
}

/// Buildings branch for records from `load_building_records`.
pub fn buildings_to_features(request: &BuildingsRequest, records: Vec<BuildingFootprint>) -> Result<FeatureSet> {
    if request.fixture.is_some() && !request.normalize_fixture {
        return project_footprints(records, request.config.hole_policy);
    }
    building_features(records, &request.config)
}

/// Fetch and convert terrain. Takes a `TerrainRequest` as JSON and returns
/// `{ "terrain": [feature, ...] }` as JSON.
#[wasm_bindgen]
pub async fn fetch_terrain(request_json: String) -> std::result::Result<JsValue, JsValue> {
    let request: TerrainRequest = serde_json::from_str(&request_json).map_err(PipelineError::from)?;
    let features = load_terrain(&request).await?;
    let response = TerrainResponseData {
        terrain: FeatureCollection::from_feature_set(&features).features,
    };
    Ok(JsValue::from_str(
        &serde_json::to_string(&response).map_err(PipelineError::from)?,
    ))
}

/// Fetch and convert buildings. Takes a `BuildingsRequest` as JSON and
/// returns `{ "buildings": [feature, ...] }` as JSON.
#[wasm_bindgen]
pub async fn fetch_buildings(request_json: String) -> std::result::Result<JsValue, JsValue> {
    let request: BuildingsRequest = serde_json::from_str(&request_json).map_err(PipelineError::from)?;
    let records = load_building_records(&request).await?;
    let features = buildings_to_features(&request, records)?;
    let response = BuildingsResponseData {
        buildings: FeatureCollection::from_feature_set(&features).features,
    };
    Ok(JsValue::from_str(
        &serde_json::to_string(&response).map_err(PipelineError::from)?,
    ))
}
