use std::collections::{HashMap, HashSet};

use earcutr::earcut;
use geo::algorithm::triangulate_spade::SpadeTriangulationConfig;
use geo::TriangulateSpade;
use geo_types::{Coord, LineString, Polygon};
use js_sys::{Float32Array, Object, Uint32Array};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

use crate::console_log;
use crate::error::{PipelineError, Result};
use crate::geojson_features::FeatureCollection;
use crate::models::{Feature, FeatureSet, Mesh};

const EPSILON: f64 = 1e-10;

/// Planar scale applied to geographic coordinates before extrusion.
pub const DEFAULT_SCALE: [f64; 2] = [25000.0, 25000.0];

/// Simple 2D vector struct
#[derive(Clone, Copy, Debug, PartialEq)]
struct Vector2 {
    x: f64,
    y: f64,
}

impl Vector2 {
    fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Extrusion options.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtrudeOptions {
    /// Multiplier for (x, y) before triangulation.
    pub scale: [f64; 2],
    /// Height of one unit of feature `val`.
    pub vertical_unit: f64,
    /// Emit the downward-facing cap. Walls and top cap are always emitted.
    pub bottom_cap: bool,
}

impl Default for ExtrudeOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            vertical_unit: 1.0,
            bottom_cap: true,
        }
    }
}

// For JSON deserialization compatibility
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExtrudeOptionsJson {
    #[serde(default = "default_scale")]
    pub scale: [f64; 2],
    #[serde(default = "default_vertical_unit")]
    pub vertical_unit: f64,
    #[serde(default = "default_bottom_cap")]
    pub bottom_cap: bool,
}

// Default values for JSON options
fn default_scale() -> [f64; 2] {
    DEFAULT_SCALE
}
fn default_vertical_unit() -> f64 {
    1.0
}
fn default_bottom_cap() -> bool {
    true
}

impl From<ExtrudeOptionsJson> for ExtrudeOptions {
    fn from(json: ExtrudeOptionsJson) -> Self {
        Self {
            scale: json.scale,
            vertical_unit: json.vertical_unit,
            bottom_cap: json.bottom_cap,
        }
    }
}

/// Helper function to check if points are in clockwise order (y up)
fn is_clockwise(points: &[Vector2]) -> bool {
    let mut area = 0.0;
    for i in 0..points.len() {
        let j = (i + 1) % points.len();
        area += points[i].x * points[j].y;
        area -= points[j].x * points[i].y;
    }
    area <= 0.0
}

/// Merge overlapping points in a contour
fn merge_overlapping_points(points: &mut Vec<Vector2>) {
    if points.is_empty() {
        return;
    }

    let threshold_sq = EPSILON * EPSILON;
    let mut prev_pos = points[0];
    let mut i = 1;

    while i < points.len() {
        let current_pos = points[i];
        let dx = current_pos.x - prev_pos.x;
        let dy = current_pos.y - prev_pos.y;
        let dist_sq = dx * dx + dy * dy;

        let scaling_factor_sqrt = f64::max(
            f64::max(current_pos.x.abs(), current_pos.y.abs()),
            f64::max(prev_pos.x.abs(), prev_pos.y.abs()),
        );
        let threshold_sq_scaled = threshold_sq * scaling_factor_sqrt * scaling_factor_sqrt;

        if dist_sq <= threshold_sq_scaled {
            points.remove(i);
            continue;
        }

        prev_pos = current_pos;
        i += 1;
    }
}

fn triangle_area(a: Vector2, b: Vector2, c: Vector2) -> f64 {
    ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)) * 0.5
}

/// Open ring (closing vertex dropped), scaled.
fn scaled_ring(ring: &LineString<f64>, scale: [f64; 2]) -> Vec<Vector2> {
    let coords = &ring.0;
    let open = if ring.is_closed() && !coords.is_empty() {
        &coords[..coords.len() - 1]
    } else {
        &coords[..]
    };
    open.iter()
        .map(|c| Vector2::new(c.x * scale[0], c.y * scale[1]))
        .collect()
}

fn vertex_key(v: Vector2) -> (u64, u64) {
    // + 0.0 folds -0.0 into 0.0
    ((v.x + 0.0).to_bits(), (v.y + 0.0).to_bits())
}

/// True when any vertex appears more than once across all rings.
fn has_shared_vertices(vertices: &[Vector2]) -> bool {
    let mut seen = HashSet::with_capacity(vertices.len());
    !vertices.iter().all(|&v| seen.insert(vertex_key(v)))
}

/// Triangulate contour and holes directly (no bevel)
fn triangulate_earcut(index: usize, contour: &[Vector2], holes: &[Vec<Vector2>]) -> Result<Vec<usize>> {
    let vlen = contour.len() + holes.iter().map(Vec::len).sum::<usize>();
    let mut data: Vec<f64> = Vec::with_capacity(vlen * 2);
    let mut hole_indices: Vec<usize> = Vec::with_capacity(holes.len());
    for pt in contour {
        data.push(pt.x);
        data.push(pt.y);
    }
    let mut idx_offset = contour.len();
    for hole in holes {
        hole_indices.push(idx_offset);
        for pt in hole {
            data.push(pt.x);
            data.push(pt.y);
        }
        idx_offset += hole.len();
    }
    earcut(&data, &hole_indices, 2).map_err(|e| {
        PipelineError::invalid_polygon(format!("feature {} failed to triangulate: {:?}", index, e))
    })
}

/// Constrained Delaunay triangulation of the rings, keeping only triangles
/// inside the polygon. Triangle corners are mapped back onto `vertices`;
/// a shared vertex resolves to its first occurrence.
fn triangulate_constrained(
    index: usize,
    contour: &[Vector2],
    holes: &[Vec<Vector2>],
    vertices: &[Vector2],
) -> Result<Vec<usize>> {
    let ring = |points: &[Vector2]| -> LineString<f64> {
        points.iter().map(|p| Coord { x: p.x, y: p.y }).collect()
    };
    let polygon = Polygon::new(ring(contour), holes.iter().map(|h| ring(h.as_slice())).collect());

    let triangles = polygon
        .constrained_triangulation(SpadeTriangulationConfig::default())
        .map_err(|e| {
            PipelineError::invalid_polygon(format!("feature {} failed to triangulate: {}", index, e))
        })?;

    let mut lookup: HashMap<(u64, u64), usize> = HashMap::with_capacity(vertices.len());
    for (i, &v) in vertices.iter().enumerate() {
        lookup.entry(vertex_key(v)).or_insert(i);
    }

    let mut indices = Vec::with_capacity(triangles.len() * 3);
    for triangle in triangles {
        for corner in triangle.to_array() {
            let i = lookup
                .get(&vertex_key(Vector2::new(corner.x, corner.y)))
                .ok_or_else(|| {
                    PipelineError::invalid_polygon(format!(
                        "feature {} triangulation added vertex ({}, {})",
                        index, corner.x, corner.y
                    ))
                })?;
            indices.push(*i);
        }
    }
    Ok(indices)
}

/// Extrude every feature of `set` from z = 0 to z = val * vertical_unit.
///
/// Positions accumulate across features without deduplication; triangle
/// indices refer to this mesh's position list.
pub fn extrude_features(set: &FeatureSet, opts: &ExtrudeOptions) -> Result<Mesh> {
    let mut mesh = Mesh::default();

    for (index, feature) in set.features.iter().enumerate() {
        extrude_feature(&mut mesh, index, feature, opts)?;
    }

    console_log!(
        "Extruded {} features into {} vertices and {} triangles",
        set.len(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

fn extrude_feature(mesh: &mut Mesh, index: usize, feature: &Feature, opts: &ExtrudeOptions) -> Result<()> {
    if !feature.val.is_finite() || feature.val < 0.0 {
        return Err(PipelineError::InvalidHeight {
            index,
            value: feature.val,
        });
    }
    let depth = feature.val * opts.vertical_unit;

    let mut contour = scaled_ring(feature.polygon.exterior(), opts.scale);
    let mut holes: Vec<Vec<Vector2>> = feature
        .polygon
        .interiors()
        .iter()
        .map(|ring| scaled_ring(ring, opts.scale))
        .collect();

    // Merge overlapping points
    merge_overlapping_points(&mut contour);
    for hole in &mut holes {
        merge_overlapping_points(hole);
    }
    if contour.len() < 3 || holes.iter().any(|hole| hole.len() < 3) {
        return Err(PipelineError::invalid_polygon(format!(
            "feature {} has a ring with fewer than 3 distinct vertices",
            index
        )));
    }

    // Contour counter-clockwise, holes clockwise, so caps face up/down and walls face out
    if is_clockwise(&contour) {
        contour.reverse();
    }
    for hole in &mut holes {
        if !is_clockwise(hole) {
            hole.reverse();
        }
    }

    // Prepare vertices (contour and holes)
    let mut vertices = contour.clone();
    for hole in &holes {
        vertices.extend(hole.iter().copied());
    }
    let vlen = vertices.len();

    let indices = if has_shared_vertices(&vertices) {
        // Pinched rings (holes touching each other or the contour) trip up earcut
        triangulate_constrained(index, &contour, &holes, &vertices)?
    } else {
        triangulate_earcut(index, &contour, &holes)?
    };
    if indices.is_empty() {
        return Err(PipelineError::invalid_polygon(format!(
            "feature {} triangulated to no faces",
            index
        )));
    }

    // Orient every cap triangle counter-clockwise
    let faces: Vec<[usize; 3]> = indices
        .chunks_exact(3)
        .map(|t| {
            if triangle_area(vertices[t[0]], vertices[t[1]], vertices[t[2]]) < 0.0 {
                [t[0], t[2], t[1]]
            } else {
                [t[0], t[1], t[2]]
            }
        })
        .collect();

    // Bottom layer then top layer
    let bottom = mesh.positions.len();
    let top = bottom + vlen;
    for vert in &vertices {
        mesh.positions.push([vert.x, vert.y, 0.0]);
    }
    for vert in &vertices {
        mesh.positions.push([vert.x, vert.y, depth]);
    }

    // Top faces
    for face in &faces {
        mesh.triangles.push([top + face[0], top + face[1], top + face[2]]);
    }

    // Bottom faces
    if opts.bottom_cap {
        for face in &faces {
            mesh.triangles.push([bottom + face[2], bottom + face[1], bottom + face[0]]);
        }
    }

    // Sidewalls for contour, then for holes
    let mut layer_offset = 0;
    let ring_lengths = std::iter::once(contour.len()).chain(holes.iter().map(|h| h.len()));
    for ring_len in ring_lengths {
        for i in 0..ring_len {
            let j = (i + 1) % ring_len;
            let (bi, bj) = (bottom + layer_offset + i, bottom + layer_offset + j);
            let (ti, tj) = (top + layer_offset + i, top + layer_offset + j);
            mesh.triangles.push([bi, bj, tj]);
            mesh.triangles.push([bi, tj, ti]);
        }
        layer_offset += ring_len;
    }

    Ok(())
}

/// Extrude a GeoJSON feature collection for preview in the host.
/// Returns an object with `position` (Float32Array) and `index` (Uint32Array).
#[wasm_bindgen]
pub fn extrude_geometry(features_json: &str, options: &JsValue) -> std::result::Result<JsValue, JsValue> {
    let collection: FeatureCollection = serde_json::from_str(features_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid features: {}", e)))?;
    let set = collection.into_feature_set()?;

    let opts: ExtrudeOptions = if options.is_undefined() || options.is_null() {
        ExtrudeOptions::default()
    } else {
        serde_wasm_bindgen::from_value::<ExtrudeOptionsJson>(options.clone())
            .map_err(|e| JsValue::from_str(&format!("Invalid options: {}", e)))?
            .into()
    };

    let mesh = extrude_features(&set, &opts)?;

    let positions: Vec<f32> = mesh
        .positions
        .iter()
        .flat_map(|p| p.iter().map(|&v| v as f32))
        .collect();
    let indices: Vec<u32> = mesh
        .triangles
        .iter()
        .flat_map(|t| t.iter().map(|&i| i as u32))
        .collect();

    let result = Object::new();
    js_sys::Reflect::set(
        &result,
        &JsValue::from_str("position"),
        &Float32Array::from(positions.as_slice()),
    )?;
    js_sys::Reflect::set(
        &result,
        &JsValue::from_str("index"),
        &Uint32Array::from(indices.as_slice()),
    )?;

    Ok(result.into())
}
