// Single-band raster grids handed to the polygonizer
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Affine mapping from grid indices to output coordinates.
/// Rotation terms are not supported.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Pixel frame of an image with no georeferencing: origin at the top-left,
    /// rows growing downward.
    pub const IDENTITY: GeoTransform = GeoTransform {
        origin_x: 0.0,
        origin_y: 0.0,
        pixel_width: 1.0,
        pixel_height: 1.0,
    };

    /// Position of the grid corner `(col, row)`.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Row-major grid of cell values.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBand {
    width: usize,
    height: usize,
    data: Vec<f64>,
    geotransform: GeoTransform,
}

impl RasterBand {
    pub fn new(width: usize, height: usize, data: Vec<f64>) -> Result<Self> {
        Self::with_geotransform(width, height, data, GeoTransform::IDENTITY)
    }

    pub fn with_geotransform(
        width: usize,
        height: usize,
        data: Vec<f64>,
        geotransform: GeoTransform,
    ) -> Result<Self> {
        let expected = width.checked_mul(height).ok_or_else(|| {
            PipelineError::invalid_raster(format!("{}x{} grid is too large", width, height))
        })?;
        if data.len() != expected {
            return Err(PipelineError::invalid_raster(format!(
                "{}x{} grid needs {} cells, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            geotransform,
        })
    }

    /// Extract one band out of an interleaved 8-bit image buffer
    /// (`channels` samples per pixel, `band_index` is 0-based).
    pub fn from_interleaved(
        width: usize,
        height: usize,
        channels: usize,
        band_index: usize,
        pixels: &[u8],
    ) -> Result<Self> {
        if channels == 0 || band_index >= channels {
            return Err(PipelineError::invalid_raster(format!(
                "band {} not available in a {}-channel image",
                band_index, channels
            )));
        }
        let expected = width
            .checked_mul(height)
            .and_then(|cells| cells.checked_mul(channels))
            .ok_or_else(|| {
                PipelineError::invalid_raster(format!("{}x{} image is too large", width, height))
            })?;
        if pixels.len() != expected {
            return Err(PipelineError::invalid_raster(format!(
                "{}x{}x{} image needs {} bytes, got {}",
                width,
                height,
                channels,
                expected,
                pixels.len()
            )));
        }

        let data = pixels
            .chunks_exact(channels)
            .map(|px| px[band_index] as f64)
            .collect();
        Self::new(width, height, data)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn geotransform(&self) -> GeoTransform {
        self.geotransform
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Unchecked access for callers iterating inside the grid bounds.
    pub(crate) fn value(&self, col: usize, row: usize) -> f64 {
        self.data[row * self.width + col]
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col < self.width && row < self.height {
            Some(self.data[row * self.width + col])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_cell_count() {
        let err = RasterBand::new(2, 2, vec![1.0; 3]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRaster { .. }));
    }

    #[test]
    fn extracts_requested_band() {
        // two RGBA pixels, green channel is band 1
        let pixels = [10, 20, 30, 255, 11, 21, 31, 255];
        let band = RasterBand::from_interleaved(2, 1, 4, 1, &pixels).unwrap();
        assert_eq!(band.get(0, 0), Some(20.0));
        assert_eq!(band.get(1, 0), Some(21.0));
        assert_eq!(band.get(2, 0), None);
    }

    #[test]
    fn rejects_missing_band() {
        let err = RasterBand::from_interleaved(1, 1, 3, 3, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRaster { .. }));
    }

    #[test]
    fn zero_dimension_band_is_empty() {
        let band = RasterBand::new(0, 5, Vec::new()).unwrap();
        assert!(band.is_empty());
    }
}
