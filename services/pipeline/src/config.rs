//! Runtime configuration for the pipeline service.

use std::path::PathBuf;
use std::time::Duration;

use climate_common::{PipelineError, PipelineResult};
use raster_derive::DeriveConfig;

/// Configuration for one pipeline run.
///
/// Credentials, the data root and the land-boundary path come from the
/// environment (or CLI flags); the derivation constants live in
/// [`DeriveConfig`] with the archive-compatible defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the artifact tree.
    pub root_dir: PathBuf,
    /// Remote archive endpoint for reanalysis retrievals.
    pub archive_url: String,
    /// API key for the archive, if required.
    pub archive_key: Option<String>,
    /// Land-boundary polygon (GeoJSON).
    pub land_mask_path: PathBuf,
    /// HTTP request timeout for retrievals.
    pub request_timeout: Duration,
    /// Maximum retry attempts per download.
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry).
    pub initial_retry_delay: Duration,
    /// Raster derivation constants.
    pub derive: DeriveConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./era5_data"),
            archive_url: "https://cds.climate.copernicus.eu/api/retrieve/v1/reanalysis-era5-single-levels".to_string(),
            archive_key: None,
            land_mask_path: PathBuf::from("./shpfiles/world_map/ne_10m_land.geojson"),
            request_timeout: Duration::from_secs(600),
            max_retries: 5,
            initial_retry_delay: Duration::from_secs(2),
            derive: DeriveConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ERA5_ROOT_DIR") {
            config.root_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("ERA5_ARCHIVE_URL") {
            config.archive_url = val;
        }
        if let Ok(val) = std::env::var("ERA5_ARCHIVE_KEY") {
            config.archive_key = Some(val);
        }
        if let Ok(val) = std::env::var("ERA5_LAND_MASK") {
            config.land_mask_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("ERA5_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.request_timeout = Duration::from_secs(secs);
            }
        }
        if let Ok(val) = std::env::var("ERA5_MAX_RETRIES") {
            if let Ok(retries) = val.parse() {
                config.max_retries = retries;
            }
        }
        if let Ok(val) = std::env::var("ERA5_RESOLUTION") {
            if let Ok(res) = val.parse() {
                config.derive.resolution = res;
            }
        }
        if let Ok(val) = std::env::var("ERA5_NODATA") {
            if let Ok(nodata) = val.parse() {
                config.derive.nodata = nodata;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.archive_url.is_empty() {
            return Err(PipelineError::config("archive URL must not be empty"));
        }
        if self.request_timeout.is_zero() {
            return Err(PipelineError::config("request timeout must be > 0"));
        }
        self.derive.validate()
    }
}
