//! Common types and utilities shared across the ERA5 derived-products pipeline.

pub mod error;
pub mod floats;
pub mod grid;
pub mod period;
pub mod variables;

pub use error::{PipelineError, PipelineResult};
pub use grid::Grid;
pub use period::{MonthBucket, RangePeriod};
pub use variables::VariableSet;
