//! Remote archive retrieval.
//!
//! The network client is a collaborator behind [`DataSource`]: given a
//! variable set and a fully enumerated (year, month, days, times) request
//! it materializes the raw download at a local path. [`ArchiveClient`]
//! talks to a CDS-style reanalysis endpoint with streaming downloads,
//! exponential-backoff retries and temp-file + rename discipline.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use climate_common::{PipelineError, PipelineResult, VariableSet};
use futures::StreamExt;
use reqwest::Client;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;

/// Fetches one raw download from the remote archive.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Retrieve the given request into `dest`. `dest`'s parent directory
    /// exists; the write must be complete when this returns Ok.
    async fn fetch(
        &self,
        variables: &VariableSet,
        year: &str,
        month: &str,
        days: &[String],
        times: &[String],
        dest: &Path,
    ) -> PipelineResult<()>;
}

/// Shared sources delegate, so an `Arc`-held source can drive the
/// orchestrator directly.
#[async_trait]
impl<T: DataSource + ?Sized> DataSource for Arc<T> {
    async fn fetch(
        &self,
        variables: &VariableSet,
        year: &str,
        month: &str,
        days: &[String],
        times: &[String],
        dest: &Path,
    ) -> PipelineResult<()> {
        (**self).fetch(variables, year, month, days, times, dest).await
    }
}

/// HTTP client for a CDS-style reanalysis archive.
pub struct ArchiveClient {
    client: Client,
    archive_url: String,
    archive_key: Option<String>,
    max_retries: u32,
    initial_retry_delay: Duration,
}

impl ArchiveClient {
    pub fn new(config: &PipelineConfig) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PipelineError::download(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            client,
            archive_url: config.archive_url.clone(),
            archive_key: config.archive_key.clone(),
            max_retries: config.max_retries,
            initial_retry_delay: config.initial_retry_delay,
        })
    }

    async fn fetch_once(
        &self,
        body: &serde_json::Value,
        dest: &Path,
    ) -> PipelineResult<()> {
        let mut request = self.client.post(&self.archive_url).json(body);
        if let Some(key) = &self.archive_key {
            request = request.header("PRIVATE-TOKEN", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::download(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::download(format!("HTTP {status}")));
        }

        // Stream to a temp path; only a complete body reaches `dest`.
        let temp = dest.with_extension("nc.partial");
        let mut file = tokio::fs::File::create(&temp).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| PipelineError::download(format!("stream error: {e}")))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp, dest).await?;
        Ok(())
    }
}

#[async_trait]
impl DataSource for ArchiveClient {
    async fn fetch(
        &self,
        variables: &VariableSet,
        year: &str,
        month: &str,
        days: &[String],
        times: &[String],
        dest: &Path,
    ) -> PipelineResult<()> {
        let body = json!({
            "product_type": ["reanalysis"],
            "year": [year],
            "month": [month],
            "day": days,
            "time": times,
            "data_format": "netcdf",
            "download_format": "unarchived",
            "variable": variables.codes(),
        });

        let mut delay = self.initial_retry_delay;
        let mut attempt = 0u32;
        loop {
            match self.fetch_once(&body, dest).await {
                Ok(()) => {
                    info!(path = %dest.display(), "download completed");
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(PipelineError::download(format!(
                            "failed after {attempt} attempts: {e}"
                        )));
                    }
                    warn!(
                        error = %e,
                        attempt,
                        max_retries = self.max_retries,
                        delay_secs = delay.as_secs(),
                        "download failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(120));
                    debug!("retrying download");
                }
            }
        }
    }
}
