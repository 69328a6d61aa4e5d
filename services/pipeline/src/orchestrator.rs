//! Drives the pipeline stages across variable sets, years and months.
//!
//! Stage failures are isolated per (variable-set, period): the
//! orchestrator logs, records the failure and continues with independent
//! periods. Long-term baselines form a barrier — every baseline for the
//! run is fully written before any anomaly reads one. Cancellation is
//! cooperative, checked between periods.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use artifact_store::{ArtifactCache, DataLayout, RasterStep, Stage};
use climate_common::period::{month_days, ALL_MONTHS, HOUR_STEPS};
use climate_common::{MonthBucket, PipelineError, PipelineResult, RangePeriod, VariableSet};
use grid_engine::{longterm_average, matching_downloads, monthly_mean, percentage_anomaly};
use grid_engine::{GridStore, JsonGridStore};
use raster_derive::{DerivationChain, Product, SoftwareBackend};
use tracing::{error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::source::DataSource;

/// What one run should process.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub variable_sets: Vec<VariableSet>,
    pub years: Vec<String>,
    pub months: Vec<String>,
    /// Also run the long-term-average and anomaly chain.
    pub with_anomalies: bool,
    /// Baseline anomalies against the all-time average (`lt_average.nc`,
    /// `anomaly_year_<p>.nc`) instead of per-calendar-month baselines.
    pub annual_baseline: bool,
}

/// Outcome of one unit of work.
enum Outcome {
    Computed,
    Skipped,
}

/// Per-run status report.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    /// Log the end-of-run report; failed units are safely retryable by
    /// rerunning the same invocation.
    pub fn report(&self) {
        info!(
            succeeded = self.succeeded.len(),
            skipped = self.skipped.len(),
            failed = self.failed.len(),
            cancelled = self.cancelled,
            "pipeline run finished"
        );
        for (unit, reason) in &self.failed {
            error!(unit, reason, "unit failed");
        }
    }

    /// Record a unit outcome. Errors fatal for the whole run (config,
    /// cancellation) are not absorbed into the summary.
    fn record(&mut self, unit: String, result: PipelineResult<Outcome>) -> PipelineResult<()> {
        match result {
            Ok(Outcome::Computed) => self.succeeded.push(unit),
            Ok(Outcome::Skipped) => self.skipped.push(unit),
            Err(e) if e.is_fatal_for_run() => return Err(e),
            Err(e) => {
                error!(unit, error = %e, "unit failed, continuing with independent periods");
                self.failed.push((unit, e.to_string()));
            }
        }
        Ok(())
    }
}

/// Sequences the pipeline stages in dependency order.
pub struct Orchestrator<S: DataSource> {
    config: PipelineConfig,
    layout: DataLayout,
    cache: ArtifactCache,
    store: JsonGridStore,
    backend: SoftwareBackend,
    source: S,
    cancel: Arc<AtomicBool>,
}

impl<S: DataSource> Orchestrator<S> {
    pub fn new(
        config: PipelineConfig,
        source: S,
        backend: SoftwareBackend,
        force: bool,
    ) -> Self {
        let layout = DataLayout::new(&config.root_dir);
        Self {
            config,
            layout,
            cache: ArtifactCache::forced(force),
            store: JsonGridStore,
            backend,
            source,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that requests cancellation at the next period boundary.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Run the full chain for the request.
    pub async fn run(&self, request: &RunRequest) -> PipelineResult<RunSummary> {
        validate_request(request)?;
        let mut summary = RunSummary::default();
        self.run_inner(request, &mut summary).await?;
        summary.report();
        Ok(summary)
    }

    async fn run_inner(
        &self,
        request: &RunRequest,
        summary: &mut RunSummary,
    ) -> PipelineResult<()> {
        for vars in &request.variable_sets {
            let mut periods = Vec::new();
            for year in &request.years {
                for month in &request.months {
                    periods.push((year.clone(), month.clone(), RangePeriod::for_month(year, month)?));
                }
            }

            info!(
                variables = %vars,
                periods = periods.len(),
                with_anomalies = request.with_anomalies,
                "starting variable set"
            );

            for (year, month, period) in &periods {
                if self.cancelled() {
                    warn!("cancellation requested, stopping before next period");
                    summary.cancelled = true;
                    return Ok(());
                }
                let unit = format!("{} mean {}", vars.key(), period);
                let result = self.process_period(vars, year, month, period).await;
                summary.record(unit, result)?;
            }

            if request.with_anomalies {
                // Barrier: every baseline is written before any anomaly
                // reads one.
                for bucket in baseline_buckets(request) {
                    if self.cancelled() {
                        summary.cancelled = true;
                        return Ok(());
                    }
                    let unit = format!("{} {}", vars.key(), DataLayout::longterm_stem(&bucket));
                    let result = self.compute_baseline(vars, &bucket);
                    summary.record(unit, result)?;
                }

                for (_, _, period) in &periods {
                    if self.cancelled() {
                        summary.cancelled = true;
                        return Ok(());
                    }
                    let bucket = if request.annual_baseline {
                        MonthBucket::All
                    } else {
                        MonthBucket::Month(period.month().to_string())
                    };
                    let unit = format!("{} anomaly {}", vars.key(), period);
                    let result = self.process_anomaly(vars, period, &bucket);
                    summary.record(unit, result)?;
                }
            }
        }

        Ok(())
    }

    /// Download, aggregate and derive the mean product for one period.
    #[instrument(skip(self, vars, period), fields(vars = %vars.key(), period = %period))]
    async fn process_period(
        &self,
        vars: &VariableSet,
        year: &str,
        month: &str,
        period: &RangePeriod,
    ) -> PipelineResult<Outcome> {
        let download_path = self.layout.download_path(vars, period);
        let mean_path = self.layout.mean_path(vars, period);
        let stem = DataLayout::mean_stem(period);
        let mut computed = false;

        if let Some(claim) = self.cache.claim(&download_path)? {
            info!(%period, "downloading raw data");
            let days = month_days(month, year)?;
            let times: Vec<String> = HOUR_STEPS.iter().map(|t| t.to_string()).collect();
            self.source
                .fetch(vars, year, month, &days, &times, claim.temp_path())
                .await?;
            claim.commit()?;
            computed = true;
        }

        if let Some(claim) = self.cache.claim(&mean_path)? {
            let raw = self.store.open(&download_path)?;
            let mean = monthly_mean(&raw, period)?;
            self.store.write(&mean, claim.temp_path())?;
            claim.commit()?;
            computed = true;
            info!(%period, "monthly mean computed");
        }

        let image = self
            .layout
            .raster_path(vars, Stage::MonthlyMeans, &stem, RasterStep::Image);
        computed |= self.cache.should_compute(&image);
        self.derivation_chain().run(
            &self.store,
            vars,
            Stage::MonthlyMeans,
            &mean_path,
            &stem,
            Product::Mean,
        )?;

        Ok(if computed { Outcome::Computed } else { Outcome::Skipped })
    }

    /// Long-term average over every matching download on disk.
    fn compute_baseline(&self, vars: &VariableSet, bucket: &MonthBucket) -> PipelineResult<Outcome> {
        let path = self.layout.longterm_path(vars, bucket);
        let Some(claim) = self.cache.claim(&path)? else {
            return Ok(Outcome::Skipped);
        };

        let downloads_dir = self.layout.stage_dir(vars, Stage::Downloads);
        let inputs = matching_downloads(&downloads_dir, bucket)?;
        let grids = inputs
            .iter()
            .map(|p| self.store.open(p))
            .collect::<PipelineResult<Vec<_>>>()?;
        let baseline = longterm_average(&grids, bucket)?;
        self.store.write(&baseline, claim.temp_path())?;
        claim.commit()?;
        info!(bucket = bucket.key(), inputs = inputs.len(), "baseline computed");
        Ok(Outcome::Computed)
    }

    /// Anomaly against the bucket's baseline, plus its raster derivation.
    #[instrument(skip(self, vars, period, bucket), fields(vars = %vars.key(), period = %period))]
    fn process_anomaly(
        &self,
        vars: &VariableSet,
        period: &RangePeriod,
        bucket: &MonthBucket,
    ) -> PipelineResult<Outcome> {
        let anomaly_path = self.layout.anomaly_path(vars, bucket, period);
        let stem = DataLayout::anomaly_stem(bucket, period);
        let mut computed = false;

        if let Some(claim) = self.cache.claim(&anomaly_path)? {
            let mean = self.store.open(&self.layout.mean_path(vars, period))?;
            let baseline = self.store.open(&self.layout.longterm_path(vars, bucket))?;
            let anomaly = percentage_anomaly(&mean, &baseline)?;
            self.store.write(&anomaly, claim.temp_path())?;
            claim.commit()?;
            computed = true;
            info!(%period, "anomaly computed");
        }

        let image =
            self.layout
                .raster_path(vars, Stage::MonthlyAnomalies, &stem, RasterStep::Image);
        computed |= self.cache.should_compute(&image);
        self.derivation_chain().run(
            &self.store,
            vars,
            Stage::MonthlyAnomalies,
            &anomaly_path,
            &stem,
            Product::anomaly(),
        )?;

        Ok(if computed { Outcome::Computed } else { Outcome::Skipped })
    }

    fn derivation_chain(&self) -> DerivationChain<'_, SoftwareBackend> {
        DerivationChain::new(&self.layout, &self.cache, &self.backend, &self.config.derive)
    }
}

/// Baselines the run must materialize before any anomaly: one per
/// distinct requested month, or the single all-time baseline.
fn baseline_buckets(request: &RunRequest) -> Vec<MonthBucket> {
    if request.annual_baseline {
        vec![MonthBucket::All]
    } else {
        dedup_months(&request.months)
            .into_iter()
            .map(MonthBucket::Month)
            .collect()
    }
}

fn dedup_months(months: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for m in months {
        if !seen.contains(m) {
            seen.push(m.clone());
        }
    }
    seen
}

fn validate_request(request: &RunRequest) -> PipelineResult<()> {
    if request.variable_sets.is_empty() {
        return Err(PipelineError::config("no variable sets requested"));
    }
    if request.years.is_empty() || request.months.is_empty() {
        return Err(PipelineError::config("years and months must be non-empty"));
    }
    for year in &request.years {
        if year.len() != 4 || year.parse::<u32>().is_err() {
            return Err(PipelineError::config(format!("bad year: {year:?}")));
        }
    }
    for month in &request.months {
        if !ALL_MONTHS.contains(&month.as_str()) {
            return Err(PipelineError::config(format!("bad month: {month:?}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_request() {
        let vars = VariableSet::new(["ssrd"]).unwrap();
        let ok = RunRequest {
            variable_sets: vec![vars.clone()],
            years: vec!["2016".into()],
            months: vec!["03".into()],
            with_anomalies: false,
            annual_baseline: false,
        };
        assert!(validate_request(&ok).is_ok());

        let bad_year = RunRequest {
            years: vec!["16".into()],
            ..ok.clone()
        };
        assert!(validate_request(&bad_year).is_err());

        let bad_month = RunRequest {
            months: vec!["13".into()],
            ..ok.clone()
        };
        assert!(validate_request(&bad_month).is_err());

        let empty = RunRequest {
            variable_sets: vec![],
            ..ok
        };
        assert!(validate_request(&empty).is_err());
    }

    #[test]
    fn test_dedup_months() {
        let months = vec!["03".to_string(), "04".to_string(), "03".to_string()];
        assert_eq!(dedup_months(&months), vec!["03".to_string(), "04".to_string()]);
    }

    #[test]
    fn test_baseline_buckets() {
        let vars = VariableSet::new(["ssrd"]).unwrap();
        let mut request = RunRequest {
            variable_sets: vec![vars],
            years: vec!["2016".into()],
            months: vec!["03".into(), "04".into()],
            with_anomalies: true,
            annual_baseline: false,
        };
        assert_eq!(
            baseline_buckets(&request),
            vec![
                MonthBucket::Month("03".into()),
                MonthBucket::Month("04".into())
            ]
        );

        request.annual_baseline = true;
        assert_eq!(baseline_buckets(&request), vec![MonthBucket::All]);
    }
}
