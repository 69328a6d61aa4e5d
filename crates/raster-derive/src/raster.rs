//! Single-band georeferenced rasters.

use serde::{Deserialize, Serialize};

use climate_common::{PipelineError, PipelineResult};

/// A single-band raster with a regular geographic grid.
///
/// Values are row-major, north to south. `west`/`north` are the outer
/// edges of the first pixel; pixel centers sit half a cell inside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoRaster {
    /// Coordinate reference identifier, e.g. "EPSG:4326".
    pub crs: String,
    /// West edge of the first column.
    pub west: f64,
    /// North edge of the first row.
    pub north: f64,
    /// Pixel width in degrees (positive).
    pub dx: f64,
    /// Pixel height in degrees (positive; rows advance southward).
    pub dy: f64,
    pub width: usize,
    pub height: usize,
    /// Sentinel marking cells with no valid measurement.
    pub nodata: Option<f64>,
    #[serde(with = "climate_common::floats::float_buffer")]
    pub values: Vec<f64>,
}

impl GeoRaster {
    /// Validate buffer length against the declared shape.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.width == 0 || self.height == 0 || self.values.len() != self.width * self.height {
            return Err(PipelineError::backend(format!(
                "raster buffer length {} does not match {}x{}",
                self.values.len(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    pub fn at(&self, x: usize, y: usize) -> f64 {
        self.values[y * self.width + x]
    }

    /// Longitude of the center of column `x`.
    pub fn lon_of(&self, x: usize) -> f64 {
        self.west + (x as f64 + 0.5) * self.dx
    }

    /// Latitude of the center of row `y`.
    pub fn lat_of(&self, y: usize) -> f64 {
        self.north - (y as f64 + 0.5) * self.dy
    }

    /// Geographic extent as [west, south, east, north].
    pub fn extent(&self) -> [f64; 4] {
        [
            self.west,
            self.north - self.height as f64 * self.dy,
            self.west + self.width as f64 * self.dx,
            self.north,
        ]
    }

    /// Whether a cell value counts as missing: non-finite (NaN, ±inf from
    /// zero-baseline anomalies) or equal to the nodata sentinel.
    pub fn is_missing(&self, v: f64) -> bool {
        !v.is_finite() || self.nodata.is_some_and(|nd| v == nd)
    }

    /// Min and max over valid cells, if any cell is valid.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for &v in &self.values {
            if self.is_missing(v) {
                continue;
            }
            range = Some(match range {
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
                None => (v, v),
            });
        }
        range
    }

    /// Copy with the nodata sentinel assigned. Metadata-only: cell values
    /// are unchanged.
    pub fn with_nodata(&self, nodata: f64) -> GeoRaster {
        GeoRaster {
            nodata: Some(nodata),
            ..self.clone()
        }
    }
}
