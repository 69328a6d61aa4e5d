//! Idempotent artifact cache with an explicit per-artifact state machine.
//!
//! An artifact is `Complete` when its final path exists, `InProgress` while
//! a claim file is held, and `Unclaimed` otherwise. Writers must hold a
//! [`Claim`]: data goes to a `.partial` temp path and only reaches the
//! final path via rename after the transform fully succeeded, so a crashed
//! run can never leave a truncated file that passes the existence check.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use climate_common::{PipelineError, PipelineResult};
use tracing::{debug, warn};

/// Cache state of one artifact path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// No artifact and no claim: must be computed.
    Unclaimed,
    /// A claim file is held, presumably by another worker.
    InProgress,
    /// The final artifact exists.
    Complete,
}

/// Existence-based memoization with exclusive write claims.
#[derive(Debug, Clone, Default)]
pub struct ArtifactCache {
    /// Recompute everything, ignoring existing artifacts. Stale claims
    /// from crashed runs are cleared on the way.
    pub force: bool,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self { force: false }
    }

    pub fn forced(force: bool) -> Self {
        Self { force }
    }

    /// Current state of the artifact at `path`.
    pub fn state(&self, path: &Path) -> ArtifactState {
        if path.exists() {
            ArtifactState::Complete
        } else if claim_path(path).exists() {
            ArtifactState::InProgress
        } else {
            ArtifactState::Unclaimed
        }
    }

    /// True iff the stage must run for this artifact.
    pub fn should_compute(&self, path: &Path) -> bool {
        self.force || self.state(path) != ArtifactState::Complete
    }

    /// Acquire an exclusive claim to write `path`.
    ///
    /// Returns `Ok(None)` when the artifact is already complete (skip) or
    /// another worker holds the claim. The claim file is created with
    /// `create_new`, so two workers racing on the same path cannot both
    /// win.
    pub fn claim(&self, path: &Path) -> PipelineResult<Option<Claim>> {
        let claim = claim_path(path);

        if self.force {
            // A forced run owns the tree; clear stale claims from crashes.
            let _ = fs::remove_file(&claim);
        } else if path.exists() {
            debug!(path = %path.display(), "artifact already exists, skipping");
            return Ok(None);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&claim) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                warn!(path = %path.display(), "artifact claimed by another worker, skipping");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Some(Claim {
            final_path: path.to_path_buf(),
            temp_path: partial_path(path),
            claim_file: claim,
            committed: false,
        }))
    }
}

/// Exclusive write claim for one artifact.
///
/// Write the artifact to [`Claim::temp_path`] (or use
/// [`Claim::commit_bytes`]), then call [`Claim::commit`]. Dropping an
/// uncommitted claim releases it and discards the partial file.
#[derive(Debug)]
pub struct Claim {
    final_path: PathBuf,
    temp_path: PathBuf,
    claim_file: PathBuf,
    committed: bool,
}

impl Claim {
    /// Temp path the stage should write its output to.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Final artifact path this claim protects.
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Atomically publish the temp file as the final artifact.
    pub fn commit(mut self) -> PipelineResult<()> {
        if !self.temp_path.exists() {
            return Err(PipelineError::PartialWrite(format!(
                "no output written for {}",
                self.final_path.display()
            )));
        }
        rename_or_copy(&self.temp_path, &self.final_path)?;
        let _ = fs::remove_file(&self.claim_file);
        self.committed = true;
        Ok(())
    }

    /// Write `bytes` through the temp path and commit.
    pub fn commit_bytes(self, bytes: &[u8]) -> PipelineResult<()> {
        fs::write(&self.temp_path, bytes)?;
        self.commit()
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp_path);
            let _ = fs::remove_file(&self.claim_file);
        }
    }
}

/// Write `bytes` to `path` with the temp + rename discipline, creating
/// parent directories. For writers that do not need a claim (e.g. files
/// outside the artifact tree).
pub fn atomic_write(path: &Path, bytes: &[u8]) -> PipelineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp = partial_path(path);
    fs::write(&temp, bytes)?;
    rename_or_copy(&temp, path)
}

fn claim_path(path: &Path) -> PathBuf {
    sibling(path, ".claim")
}

fn partial_path(path: &Path) -> PathBuf {
    sibling(path, ".partial")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// Rename with copy+delete fallback for cross-filesystem moves.
fn rename_or_copy(from: &Path, to: &Path) -> PipelineResult<()> {
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}
