//! Raster derivation for aggregated climate grids.
//!
//! Converts an aggregate [`climate_common::Grid`] into a georeferenced
//! raster and then into classified imagery through five strictly ordered,
//! independently cached states: normalize, nodata-mark, resample, mask,
//! classify + render. A failed run resumes at the first missing artifact.

pub mod classify;
pub mod derive;
pub mod mask;
pub mod normalize;
pub mod png;
pub mod raster;
pub mod resample;

pub use classify::{ColorRamp, Product};
pub use derive::{DerivationChain, DeriveConfig, RasterBackend, SoftwareBackend};
pub use mask::LandMask;
pub use raster::GeoRaster;
