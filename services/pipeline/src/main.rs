//! ERA5 derived-products pipeline.
//!
//! Turns raw reanalysis retrievals into monthly means, long-term
//! baselines, percentage anomalies and classified imagery:
//! - Resumable: complete artifacts are skipped on rerun
//! - Crash-safe: every artifact is written via temp file + rename
//! - Per-period failure isolation with an end-of-run report

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use climate_common::period::ALL_MONTHS;
use climate_common::VariableSet;
use raster_derive::{LandMask, SoftwareBackend};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use pipeline::{ArchiveClient, Orchestrator, PipelineConfig, RunRequest};

#[derive(Parser, Debug)]
#[command(name = "pipeline")]
#[command(about = "ERA5 derived-products pipeline: downloads, means, anomalies, imagery")]
struct Args {
    /// Variable set to process (repeatable; codes within one set are
    /// comma-separated, e.g. -v ssrd -v "u10,v10")
    #[arg(short, long = "variables", required = true)]
    variables: Vec<String>,

    /// Years to process (e.g. -y 2016 -y 2017)
    #[arg(short, long = "years", required = true)]
    years: Vec<String>,

    /// Months to process as two-digit strings (default: all twelve)
    #[arg(short, long = "months")]
    months: Vec<String>,

    /// Root of the artifact tree
    #[arg(long, env = "ERA5_ROOT_DIR")]
    root_dir: Option<PathBuf>,

    /// Land-boundary polygon (GeoJSON) used for masking
    #[arg(long, env = "ERA5_LAND_MASK")]
    land_mask: Option<PathBuf>,

    /// Also compute long-term averages and percentage anomalies
    #[arg(long)]
    anomalies: bool,

    /// Baseline anomalies against the all-time average instead of
    /// per-calendar-month baselines (implies --anomalies)
    #[arg(long)]
    annual: bool,

    /// Recompute artifacts even when they already exist
    #[arg(long)]
    force: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = PipelineConfig::from_env();
    if let Some(root) = args.root_dir {
        config.root_dir = root;
    }
    if let Some(mask) = args.land_mask {
        config.land_mask_path = mask;
    }
    config.validate().context("invalid configuration")?;

    let variable_sets = args
        .variables
        .iter()
        .map(|arg| VariableSet::new(arg.split(',').map(str::trim)))
        .collect::<Result<Vec<_>, _>>()
        .context("invalid variable set")?;

    let months = if args.months.is_empty() {
        ALL_MONTHS.iter().map(|m| m.to_string()).collect()
    } else {
        args.months.clone()
    };

    info!(
        root = %config.root_dir.display(),
        sets = variable_sets.len(),
        years = args.years.len(),
        months = months.len(),
        anomalies = args.anomalies,
        force = args.force,
        "starting pipeline"
    );

    let land = LandMask::from_geojson_file(&config.land_mask_path)
        .context("failed to load land boundary")?;
    let backend = SoftwareBackend::new(land);
    let source = ArchiveClient::new(&config)?;
    let orchestrator = Orchestrator::new(config, source, backend, args.force);

    // Ctrl+C requests a clean stop at the next period boundary.
    let cancel = orchestrator.cancel_flag();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown signal received, finishing current period");
        cancel.store(true, Ordering::Relaxed);
    });

    let request = RunRequest {
        variable_sets,
        years: args.years,
        months,
        with_anomalies: args.anomalies || args.annual,
        annual_baseline: args.annual,
    };
    let summary = orchestrator.run(&request).await?;

    if summary.cancelled {
        anyhow::bail!("run cancelled; rerun the same invocation to resume");
    }
    if !summary.is_success() {
        anyhow::bail!(
            "{} unit(s) failed; rerun the same invocation to resume",
            summary.failed.len()
        );
    }
    Ok(())
}
