//! Error types for the derived-products pipeline.

use thiserror::Error;

/// Result type alias using PipelineError.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Primary error type for pipeline operations.
///
/// Stage failures are scoped to a single (variable-set, period) unit of
/// work; the orchestrator catches them at that granularity and continues
/// with independent periods.
#[derive(Debug, Error)]
pub enum PipelineError {
    // === Stage Errors ===
    #[error("missing upstream artifact: {0}")]
    MissingInput(String),

    #[error("aggregation has no matching inputs: {0}")]
    InsufficientData(String),

    #[error("grid alignment mismatch: {left} vs {right}")]
    GridAlignment { left: String, right: String },

    #[error("raster backend failure: {0}")]
    Backend(String),

    #[error("partial write detected: {0}")]
    PartialWrite(String),

    // === Acquisition Errors ===
    #[error("download failed: {0}")]
    Download(String),

    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    // === Infrastructure Errors ===
    #[error("configuration error: {0}")]
    Config(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Create a MissingInput error.
    pub fn missing_input(msg: impl Into<String>) -> Self {
        Self::MissingInput(msg.into())
    }

    /// Create an InsufficientData error.
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    /// Create a GridAlignment error.
    pub fn alignment(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::GridAlignment {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Create a Backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a Download error.
    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error should abort the whole run rather than just the
    /// current period.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, PipelineError::Cancelled | PipelineError::Config(_))
    }
}
