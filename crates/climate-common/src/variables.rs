//! Variable sets: the namespace key under which every artifact lives.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// An ordered, deduplicated set of variable codes.
///
/// Codes are canonicalized (sorted) before the key is built, so the same
/// set of variables resolves to the same cache namespace regardless of the
/// order they were supplied in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableSet {
    codes: Vec<String>,
}

impl VariableSet {
    /// Build a canonicalized set from variable codes.
    pub fn new<S: Into<String>>(codes: impl IntoIterator<Item = S>) -> PipelineResult<Self> {
        let mut codes: Vec<String> = codes.into_iter().map(Into::into).collect();
        codes.sort();
        codes.dedup();
        codes.retain(|c| !c.is_empty());
        if codes.is_empty() {
            return Err(PipelineError::config("variable set is empty"));
        }
        Ok(Self { codes })
    }

    /// The canonical codes, sorted.
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// The variable of interest for single-band products: the first code.
    pub fn primary(&self) -> &str {
        &self.codes[0]
    }

    /// The directory/cache key: codes joined with `-`.
    pub fn key(&self) -> String {
        self.codes.join("-")
    }
}

impl std::fmt::Display for VariableSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}
