//! The cached five-state raster derivation chain.

use std::path::Path;

use artifact_store::{ArtifactCache, DataLayout, RasterStep, Stage};
use climate_common::{PipelineError, PipelineResult, VariableSet};
use grid_engine::GridStore;
use tracing::{debug, info};

use crate::classify::{render_rgba, ColorRamp, Product};
use crate::mask::LandMask;
use crate::normalize::{grid_to_raster, normalize_longitudes};
use crate::png::encode_rgba;
use crate::raster::GeoRaster;
use crate::resample::resample_bilinear;

/// Numeric and geometric constants of the derivation chain, with the
/// defaults the product archives were built with.
#[derive(Debug, Clone)]
pub struct DeriveConfig {
    /// Coordinate reference tagged onto normalized rasters.
    pub crs: String,
    /// Nodata sentinel assigned to the single band.
    pub nodata: f64,
    /// Target resolution in degrees per pixel.
    pub resolution: f64,
    /// Classified image canvas size in pixels.
    pub canvas_width: usize,
    pub canvas_height: usize,
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            crs: "EPSG:4326".to_string(),
            nodata: -9999.0,
            resolution: 0.018,
            canvas_width: 800,
            canvas_height: 600,
        }
    }
}

impl DeriveConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(PipelineError::config("resolution must be > 0"));
        }
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(PipelineError::config("canvas size must be non-zero"));
        }
        Ok(())
    }
}

/// The raster processing backend: open, write, warp, mask, render.
///
/// An external engine (GDAL-alike) can stand behind this seam; the
/// in-process [`SoftwareBackend`] is the default.
pub trait RasterBackend: Send + Sync {
    fn open(&self, path: &Path) -> PipelineResult<GeoRaster>;
    fn write(&self, raster: &GeoRaster, path: &Path) -> PipelineResult<()>;
    fn warp(&self, raster: &GeoRaster, resolution: f64) -> PipelineResult<GeoRaster>;
    fn mask(&self, raster: &GeoRaster) -> PipelineResult<GeoRaster>;
    fn render(
        &self,
        raster: &GeoRaster,
        product: Product,
        width: usize,
        height: usize,
    ) -> PipelineResult<Vec<u8>>;
}

/// In-process raster backend.
///
/// Owns the land-boundary mask for the whole run: acquire once at
/// orchestrator start, pass by reference to every period. Rasters are
/// serialized as JSON; the `.tif` artifact extension is a layout
/// compatibility contract, not a format claim.
pub struct SoftwareBackend {
    land: LandMask,
}

impl SoftwareBackend {
    pub fn new(land: LandMask) -> Self {
        Self { land }
    }
}

impl RasterBackend for SoftwareBackend {
    fn open(&self, path: &Path) -> PipelineResult<GeoRaster> {
        if !path.exists() {
            return Err(PipelineError::missing_input(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        let raster: GeoRaster = serde_json::from_slice(&bytes)?;
        raster.validate()?;
        Ok(raster)
    }

    fn write(&self, raster: &GeoRaster, path: &Path) -> PipelineResult<()> {
        let bytes = serde_json::to_vec(raster)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn warp(&self, raster: &GeoRaster, resolution: f64) -> PipelineResult<GeoRaster> {
        resample_bilinear(raster, resolution)
    }

    fn mask(&self, raster: &GeoRaster) -> PipelineResult<GeoRaster> {
        Ok(self.land.apply(raster))
    }

    fn render(
        &self,
        raster: &GeoRaster,
        product: Product,
        width: usize,
        height: usize,
    ) -> PipelineResult<Vec<u8>> {
        let ramp = ColorRamp::for_product(product, raster)?;
        let pixels = render_rgba(raster, &ramp, width, height);
        encode_rgba(&pixels, width, height)
    }
}

/// Drives an aggregate grid through the five raster states, skipping any
/// state whose output artifact already exists so interrupted runs resume
/// at the first missing artifact.
pub struct DerivationChain<'a, B: RasterBackend> {
    layout: &'a DataLayout,
    cache: &'a ArtifactCache,
    backend: &'a B,
    config: &'a DeriveConfig,
}

impl<'a, B: RasterBackend> DerivationChain<'a, B> {
    pub fn new(
        layout: &'a DataLayout,
        cache: &'a ArtifactCache,
        backend: &'a B,
        config: &'a DeriveConfig,
    ) -> Self {
        Self {
            layout,
            cache,
            backend,
            config,
        }
    }

    /// Run the full chain for one aggregate artifact.
    ///
    /// `grid_path` is the stage's `.nc` aggregate, `stem` its filename
    /// stem (e.g. `mean_20160301_to_20160331`). A backend failure aborts
    /// the remaining states for this artifact.
    pub fn run(
        &self,
        store: &dyn GridStore,
        vars: &VariableSet,
        stage: Stage,
        grid_path: &Path,
        stem: &str,
        product: Product,
    ) -> PipelineResult<()> {
        for step in RasterStep::ALL {
            let out = self.layout.raster_path(vars, stage, stem, step);
            let Some(claim) = self.cache.claim(&out)? else {
                debug!(step = ?step, stem, "raster state cached, skipping");
                continue;
            };

            match step {
                RasterStep::Normalized => {
                    let grid = store.open(grid_path)?;
                    let normalized = normalize_longitudes(&grid)?;
                    let raster = grid_to_raster(&normalized, &self.config.crs)?;
                    self.backend.write(&raster, claim.temp_path())?;
                }
                RasterStep::NodataMarked => {
                    let input = self.open_input(vars, stage, stem, step)?;
                    let tagged = input.with_nodata(self.config.nodata);
                    self.backend.write(&tagged, claim.temp_path())?;
                }
                RasterStep::Resampled => {
                    let input = self.open_input(vars, stage, stem, step)?;
                    let warped = self.backend.warp(&input, self.config.resolution)?;
                    self.backend.write(&warped, claim.temp_path())?;
                }
                RasterStep::Masked => {
                    let input = self.open_input(vars, stage, stem, step)?;
                    let masked = self.backend.mask(&input)?;
                    self.backend.write(&masked, claim.temp_path())?;
                }
                RasterStep::Image => {
                    let input = self.open_input(vars, stage, stem, step)?;
                    let png = self.backend.render(
                        &input,
                        product,
                        self.config.canvas_width,
                        self.config.canvas_height,
                    )?;
                    claim.commit_bytes(&png)?;
                    info!(step = ?step, stem, "raster state computed");
                    continue;
                }
            }

            claim.commit()?;
            info!(step = ?step, stem, "raster state computed");
        }
        Ok(())
    }

    fn open_input(
        &self,
        vars: &VariableSet,
        stage: Stage,
        stem: &str,
        step: RasterStep,
    ) -> PipelineResult<GeoRaster> {
        let input_step = step
            .input()
            .ok_or_else(|| PipelineError::backend("raster step has no input"))?;
        let path = self.layout.raster_path(vars, stage, stem, input_step);
        self.backend.open(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_round_trip_preserves_non_finite_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.tif");
        let raster = GeoRaster {
            crs: "EPSG:4326".into(),
            west: 0.0,
            north: 1.0,
            dx: 1.0,
            dy: 1.0,
            width: 2,
            height: 2,
            nodata: Some(-9999.0),
            values: vec![1.0, f64::NAN, f64::INFINITY, -9999.0],
        };

        let backend = SoftwareBackend::new(LandMask::from_rings(vec![]));
        backend.write(&raster, &path).unwrap();
        let back = backend.open(&path).unwrap();

        assert_eq!(back.values[0], 1.0);
        assert!(back.values[1].is_nan());
        assert_eq!(back.values[2], f64::INFINITY);
        assert_eq!(back.values[3], -9999.0);
        assert_eq!(back.nodata, Some(-9999.0));
    }
}
