//! Grid codec seam.
//!
//! The gridded-array codec is an external collaborator: anything that can
//! open and write a [`Grid`] at a path satisfies [`GridStore`]. The
//! built-in [`JsonGridStore`] serializes grids as JSON through the atomic
//! write discipline; artifact names keep the `.nc` extension contract of
//! the archive layout regardless of the codec behind them.

use std::path::Path;

use artifact_store::atomic_write;
use climate_common::{Grid, PipelineError, PipelineResult};

/// Open and write gridded arrays at filesystem paths.
pub trait GridStore: Send + Sync {
    /// Open the grid stored at `path`.
    ///
    /// A missing file is `MissingInput`: the caller asked for an upstream
    /// artifact that was never produced.
    fn open(&self, path: &Path) -> PipelineResult<Grid>;

    /// Write `grid` to `path`, atomically.
    fn write(&self, grid: &Grid, path: &Path) -> PipelineResult<()>;
}

/// Serde-JSON backed grid store.
#[derive(Debug, Clone, Default)]
pub struct JsonGridStore;

impl GridStore for JsonGridStore {
    fn open(&self, path: &Path) -> PipelineResult<Grid> {
        if !path.exists() {
            return Err(PipelineError::missing_input(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        let grid: Grid = serde_json::from_slice(&bytes)?;
        Ok(grid)
    }

    fn write(&self, grid: &Grid, path: &Path) -> PipelineResult<()> {
        let bytes = serde_json::to_vec(grid)?;
        atomic_write(path, &bytes)
    }
}
