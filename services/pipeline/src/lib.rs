//! Library surface of the pipeline service, used by the binary and the
//! integration tests.

pub mod config;
pub mod orchestrator;
pub mod source;

pub use config::PipelineConfig;
pub use orchestrator::{Orchestrator, RunRequest, RunSummary};
pub use source::{ArchiveClient, DataSource};
