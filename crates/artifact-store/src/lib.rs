//! Artifact addressing and idempotent caching for pipeline outputs.
//!
//! Every stage output is addressed by a deterministic path derived from
//! (stage, variable-set, period); computation is skipped when a completed
//! artifact is already on disk. Writes go through a claim + temp-file +
//! atomic-rename discipline so a partial write never satisfies the
//! existence check.

pub mod cache;
pub mod layout;

pub use cache::{atomic_write, ArtifactCache, ArtifactState, Claim};
pub use layout::{DataLayout, RasterStep, Stage};
