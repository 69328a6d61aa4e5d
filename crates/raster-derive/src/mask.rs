//! Land-boundary masking.
//!
//! The land boundary is a GeoJSON Polygon/MultiPolygon (typically a
//! simplified world land map); raster cells whose center falls outside it
//! become nodata. Containment uses the even-odd rule across all rings, so
//! holes and disjoint polygons both behave.

use std::path::Path;

use climate_common::{PipelineError, PipelineResult};
use serde_json::Value;
use tracing::info;

use crate::raster::GeoRaster;

/// A polygon mask loaded once per orchestrator run.
#[derive(Debug, Clone)]
pub struct LandMask {
    /// All rings of all polygons, as (lon, lat) vertex lists.
    rings: Vec<Vec<(f64, f64)>>,
}

impl LandMask {
    /// Load from a GeoJSON file containing a FeatureCollection, Feature,
    /// or bare geometry of type Polygon/MultiPolygon.
    pub fn from_geojson_file(path: &Path) -> PipelineResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::config(format!("cannot read land mask {}: {e}", path.display()))
        })?;
        let doc: Value = serde_json::from_slice(&bytes)?;
        let mask = Self::from_geojson(&doc)?;
        info!(
            path = %path.display(),
            rings = mask.rings.len(),
            "loaded land boundary mask"
        );
        Ok(mask)
    }

    /// Parse a GeoJSON document into a mask.
    pub fn from_geojson(doc: &Value) -> PipelineResult<Self> {
        let mut rings = Vec::new();
        collect_rings(doc, &mut rings)?;
        if rings.is_empty() {
            return Err(PipelineError::config(
                "land mask contains no polygon geometry",
            ));
        }
        Ok(Self { rings })
    }

    /// Build directly from rings (tests, synthetic masks).
    pub fn from_rings(rings: Vec<Vec<(f64, f64)>>) -> Self {
        Self { rings }
    }

    /// Even-odd containment test for a (lon, lat) point.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let mut inside = false;
        for ring in &self.rings {
            let n = ring.len();
            if n < 3 {
                continue;
            }
            let mut j = n - 1;
            for i in 0..n {
                let (xi, yi) = ring[i];
                let (xj, yj) = ring[j];
                if (yi > lat) != (yj > lat)
                    && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi
                {
                    inside = !inside;
                }
                j = i;
            }
        }
        inside
    }

    /// Clip a raster to the mask: cells outside become nodata.
    pub fn apply(&self, raster: &GeoRaster) -> GeoRaster {
        let fill = raster.nodata.unwrap_or(f64::NAN);
        let mut out = raster.clone();
        for y in 0..out.height {
            let lat = out.lat_of(y);
            for x in 0..out.width {
                if !self.contains(out.lon_of(x), lat) {
                    out.values[y * out.width + x] = fill;
                }
            }
        }
        out
    }
}

/// Recursively collect polygon rings from any GeoJSON node.
fn collect_rings(node: &Value, rings: &mut Vec<Vec<(f64, f64)>>) -> PipelineResult<()> {
    match node.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            for feature in node
                .get("features")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                collect_rings(feature, rings)?;
            }
        }
        Some("Feature") => {
            if let Some(geometry) = node.get("geometry") {
                collect_rings(geometry, rings)?;
            }
        }
        Some("Polygon") => {
            push_polygon(node.get("coordinates"), rings)?;
        }
        Some("MultiPolygon") => {
            for polygon in node
                .get("coordinates")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                push_polygon(Some(polygon), rings)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn push_polygon(coords: Option<&Value>, rings: &mut Vec<Vec<(f64, f64)>>) -> PipelineResult<()> {
    let polygons = coords
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::config("malformed polygon coordinates in land mask"))?;
    for ring in polygons {
        let points = ring
            .as_array()
            .ok_or_else(|| PipelineError::config("malformed ring in land mask"))?;
        let mut parsed = Vec::with_capacity(points.len());
        for point in points {
            let pair = point.as_array().and_then(|p| {
                Some((p.first()?.as_f64()?, p.get(1)?.as_f64()?))
            });
            let (lon, lat) = pair
                .ok_or_else(|| PipelineError::config("malformed coordinate in land mask"))?;
            parsed.push((lon, lat));
        }
        rings.push(parsed);
    }
    Ok(())
}
