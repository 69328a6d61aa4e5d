//! Grid aggregation and anomaly engines.
//!
//! Temporal means over raw downloads (per calendar month or all-time) and
//! percentage anomalies against climatological baselines. All reductions
//! are missing-value aware: NaN samples are excluded from both the
//! numerator and the per-cell denominator.

pub mod aggregate;
pub mod anomaly;
pub mod store;

pub use aggregate::{longterm_average, matching_downloads, monthly_mean, temporal_mean};
pub use anomaly::percentage_anomaly;
pub use store::{GridStore, JsonGridStore};
