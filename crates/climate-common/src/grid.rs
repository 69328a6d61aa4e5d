//! In-memory gridded arrays with named time/latitude/longitude dimensions.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// A gridded array for one data variable.
///
/// Values are row-major `time x lat x lon`; aggregated (reduced) grids have
/// no time labels and a single `lat x lon` slab. Longitudes may be stored
/// in either [0, 360) or [-180, 180) convention; the raster stages require
/// the latter, sorted ascending (see `raster-derive`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    /// The data variable this grid carries.
    pub variable: String,
    /// Latitude coordinate values, one per row.
    pub latitudes: Vec<f64>,
    /// Longitude coordinate values, one per column.
    pub longitudes: Vec<f64>,
    /// Time-step labels; empty for reduced grids.
    pub times: Vec<String>,
    /// Cell values, row-major `time x lat x lon`. Non-finite cells
    /// (missing data, zero-baseline anomalies) survive the JSON codec.
    #[serde(with = "crate::floats::float_buffer")]
    pub values: Vec<f64>,
}

impl Grid {
    /// Create a time-resolved grid, validating the value buffer length.
    pub fn new(
        variable: impl Into<String>,
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
        times: Vec<String>,
        values: Vec<f64>,
    ) -> PipelineResult<Self> {
        let cells = latitudes.len() * longitudes.len();
        let expected = cells * times.len().max(1);
        if cells == 0 || values.len() != expected {
            return Err(PipelineError::backend(format!(
                "grid buffer length {} does not match {} steps of {}x{}",
                values.len(),
                times.len().max(1),
                latitudes.len(),
                longitudes.len()
            )));
        }
        Ok(Self {
            variable: variable.into(),
            latitudes,
            longitudes,
            times,
            values,
        })
    }

    /// Create a reduced (no time dimension) grid.
    pub fn reduced(
        variable: impl Into<String>,
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
        values: Vec<f64>,
    ) -> PipelineResult<Self> {
        Self::new(variable, latitudes, longitudes, Vec::new(), values)
    }

    pub fn n_lat(&self) -> usize {
        self.latitudes.len()
    }

    pub fn n_lon(&self) -> usize {
        self.longitudes.len()
    }

    /// Number of `lat x lon` slabs in the value buffer (1 for reduced grids).
    pub fn steps(&self) -> usize {
        self.times.len().max(1)
    }

    /// Whether the time dimension has been reduced away.
    pub fn is_reduced(&self) -> bool {
        self.times.is_empty()
    }

    /// One `lat x lon` slab of the value buffer.
    pub fn slab(&self, t: usize) -> &[f64] {
        let cells = self.n_lat() * self.n_lon();
        &self.values[t * cells..(t + 1) * cells]
    }

    /// Value at (time, lat index, lon index).
    pub fn at(&self, t: usize, j: usize, i: usize) -> f64 {
        self.values[(t * self.n_lat() + j) * self.n_lon() + i]
    }

    /// Exact coordinate-alignment check against another grid.
    pub fn aligned_with(&self, other: &Grid) -> bool {
        self.latitudes == other.latitudes && self.longitudes == other.longitudes
    }

    /// Short shape description for error messages.
    pub fn shape_desc(&self) -> String {
        format!(
            "{}[{}x{}x{}]",
            self.variable,
            self.steps(),
            self.n_lat(),
            self.n_lon()
        )
    }

    /// Require alignment with another grid, erroring with both shapes.
    pub fn require_aligned(&self, other: &Grid) -> PipelineResult<()> {
        if self.aligned_with(other) {
            Ok(())
        } else {
            Err(PipelineError::alignment(
                self.shape_desc(),
                other.shape_desc(),
            ))
        }
    }
}
