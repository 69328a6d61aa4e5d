//! End-to-end pipeline tests with a mock archive.
//!
//! The mock source writes synthetic two-step downloads whose values scale
//! with the year, so monthly means, the long-term baseline and the
//! percentage anomalies all have closed-form expected values.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use artifact_store::{DataLayout, RasterStep, Stage};
use async_trait::async_trait;
use climate_common::{Grid, MonthBucket, PipelineResult, RangePeriod, VariableSet};
use grid_engine::{GridStore, JsonGridStore};
use pipeline::{DataSource, Orchestrator, PipelineConfig, RunRequest};
use raster_derive::{DeriveConfig, LandMask, SoftwareBackend};

/// Base cell values for one lat x lon slab (2 x 4).
const BASE: [f64; 8] = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0];

/// Writes a synthetic download: two identical time steps, every cell
/// scaled by (year - 2014). 2015 downloads carry BASE, 2016 carry 2*BASE.
struct MockSource {
    fetches: AtomicU32,
}

impl MockSource {
    fn new() -> Self {
        Self {
            fetches: AtomicU32::new(0),
        }
    }

    fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DataSource for MockSource {
    async fn fetch(
        &self,
        variables: &VariableSet,
        year: &str,
        _month: &str,
        days: &[String],
        times: &[String],
        dest: &Path,
    ) -> PipelineResult<()> {
        assert!(!days.is_empty());
        assert_eq!(times.len(), 24);
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let scale = (year.parse::<f64>().unwrap() - 2014.0).max(1.0);
        let slab: Vec<f64> = BASE.iter().map(|v| v * scale).collect();
        let mut values = slab.clone();
        values.extend_from_slice(&slab);

        let grid = Grid::new(
            variables.primary(),
            vec![10.0, -10.0],
            vec![0.0, 90.0, 180.0, 270.0],
            vec!["t0".to_string(), "t1".to_string()],
            values,
        )?;
        JsonGridStore.write(&grid, dest)
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    layout: DataLayout,
    vars: VariableSet,
    orchestrator: Orchestrator<Arc<MockSource>>,
    source: Arc<MockSource>,
}

fn harness(force: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        root_dir: dir.path().to_path_buf(),
        derive: DeriveConfig {
            resolution: 45.0,
            canvas_width: 8,
            canvas_height: 4,
            ..DeriveConfig::default()
        },
        ..PipelineConfig::default()
    };
    let land = LandMask::from_rings(vec![vec![
        (-300.0, -80.0),
        (300.0, -80.0),
        (300.0, 80.0),
        (-300.0, 80.0),
        (-300.0, -80.0),
    ]]);

    let layout = DataLayout::new(dir.path());
    let vars = VariableSet::new(["ssrd"]).unwrap();
    let source = Arc::new(MockSource::new());
    let orchestrator = Orchestrator::new(
        config,
        Arc::clone(&source),
        SoftwareBackend::new(land),
        force,
    );

    Harness {
        _dir: dir,
        layout,
        vars,
        orchestrator,
        source,
    }
}

fn request(years: &[&str], with_anomalies: bool) -> RunRequest {
    RunRequest {
        variable_sets: vec![VariableSet::new(["ssrd"]).unwrap()],
        years: years.iter().map(|y| y.to_string()).collect(),
        months: vec!["03".to_string()],
        with_anomalies,
        annual_baseline: false,
    }
}

#[tokio::test]
async fn test_monthly_chain_produces_named_artifacts() {
    let h = harness(false);
    let summary = h.orchestrator.run(&request(&["2016"], false)).await.unwrap();
    assert!(summary.is_success());
    assert_eq!(summary.succeeded.len(), 1);

    let period = RangePeriod::for_month("2016", "03").unwrap();
    let download = h.layout.download_path(&h.vars, &period);
    let mean = h.layout.mean_path(&h.vars, &period);
    assert!(download.ends_with("downloads/download_20160301_to_20160331.nc"));
    assert!(mean.ends_with("monthly_means/mean_20160301_to_20160331.nc"));
    assert!(download.exists());
    assert!(mean.exists());

    // Mean of two identical 2016 slabs is 2 * BASE.
    let grid = JsonGridStore.open(&mean).unwrap();
    assert!(grid.times.is_empty());
    assert_eq!(grid.values[0], 20.0);
    assert_eq!(grid.values[7], 160.0);

    // The raster chain ran through to the image.
    let stem = DataLayout::mean_stem(&period);
    for step in RasterStep::ALL {
        let path = h.layout.raster_path(&h.vars, Stage::MonthlyMeans, &stem, step);
        assert!(path.exists(), "missing {step:?}: {path:?}");
    }
}

#[tokio::test]
async fn test_anomaly_chain_against_two_year_baseline() {
    let h = harness(false);
    let summary = h
        .orchestrator
        .run(&request(&["2015", "2016"], true))
        .await
        .unwrap();
    assert!(summary.is_success(), "failures: {:?}", summary.failed);

    let bucket = MonthBucket::Month("03".to_string());
    let baseline_path = h.layout.longterm_path(&h.vars, &bucket);
    assert!(baseline_path.ends_with("long-term_averages/lt_average_03.nc"));
    // Baseline over 2015 (1x) and 2016 (2x) is 1.5 * BASE.
    let baseline = JsonGridStore.open(&baseline_path).unwrap();
    assert_eq!(baseline.values[0], 15.0);

    let p2016 = RangePeriod::for_month("2016", "03").unwrap();
    let anomaly_path = h.layout.anomaly_path(&h.vars, &bucket, &p2016);
    assert!(anomaly_path.ends_with("monthly_anomalies/anomaly_month03_20160301_to_20160331.nc"));
    let anomaly = JsonGridStore.open(&anomaly_path).unwrap();
    // (2x - 1.5x) / 1.5x * 100
    for v in &anomaly.values {
        assert!((v - 100.0 / 3.0).abs() < 1e-9, "got {v}");
    }

    let p2015 = RangePeriod::for_month("2015", "03").unwrap();
    let anomaly = JsonGridStore
        .open(&h.layout.anomaly_path(&h.vars, &bucket, &p2015))
        .unwrap();
    for v in &anomaly.values {
        assert!((v + 100.0 / 3.0).abs() < 1e-9, "got {v}");
    }

    // Anomaly rasters land under the anomaly stage.
    let stem = DataLayout::anomaly_stem(&bucket, &p2016);
    let image = h
        .layout
        .raster_path(&h.vars, Stage::MonthlyAnomalies, &stem, RasterStep::Image);
    assert!(image.exists());
}

#[tokio::test]
async fn test_annual_anomaly_uses_all_time_baseline() {
    let h = harness(false);
    let req = RunRequest {
        annual_baseline: true,
        ..request(&["2015", "2016"], true)
    };
    let summary = h.orchestrator.run(&req).await.unwrap();
    assert!(summary.is_success(), "failures: {:?}", summary.failed);

    // A single all-time baseline, no per-month one.
    let baseline_path = h.layout.longterm_path(&h.vars, &MonthBucket::All);
    assert!(baseline_path.ends_with("long-term_averages/lt_average.nc"));
    assert!(baseline_path.exists());
    let monthly_bucket = MonthBucket::Month("03".to_string());
    assert!(!h.layout.longterm_path(&h.vars, &monthly_bucket).exists());

    let baseline = JsonGridStore.open(&baseline_path).unwrap();
    assert_eq!(baseline.values[0], 15.0);

    // Anomalies carry the annual naming and divide by the all-time mean.
    let p2016 = RangePeriod::for_month("2016", "03").unwrap();
    let anomaly_path = h.layout.anomaly_path(&h.vars, &MonthBucket::All, &p2016);
    assert!(anomaly_path.ends_with("monthly_anomalies/anomaly_year_20160301_to_20160331.nc"));
    let anomaly = JsonGridStore.open(&anomaly_path).unwrap();
    for v in &anomaly.values {
        assert!((v - 100.0 / 3.0).abs() < 1e-9, "got {v}");
    }

    let stem = DataLayout::anomaly_stem(&MonthBucket::All, &p2016);
    let image = h
        .layout
        .raster_path(&h.vars, Stage::MonthlyAnomalies, &stem, RasterStep::Image);
    assert!(image.exists());
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let h = harness(false);
    let req = request(&["2016"], false);
    h.orchestrator.run(&req).await.unwrap();
    assert_eq!(h.source.fetch_count(), 1);

    let period = RangePeriod::for_month("2016", "03").unwrap();
    let mean = h.layout.mean_path(&h.vars, &period);
    let mtime = std::fs::metadata(&mean).unwrap().modified().unwrap();

    let summary = h.orchestrator.run(&req).await.unwrap();
    assert!(summary.is_success());
    assert_eq!(summary.succeeded.len(), 0);
    assert_eq!(summary.skipped.len(), 1);
    // No new fetch, no rewrite.
    assert_eq!(h.source.fetch_count(), 1);
    assert_eq!(std::fs::metadata(&mean).unwrap().modified().unwrap(), mtime);
}

#[tokio::test]
async fn test_failed_period_does_not_block_others() {
    struct FlakySource {
        inner: MockSource,
    }

    #[async_trait]
    impl DataSource for FlakySource {
        async fn fetch(
            &self,
            variables: &VariableSet,
            year: &str,
            month: &str,
            days: &[String],
            times: &[String],
            dest: &Path,
        ) -> PipelineResult<()> {
            if year == "2015" {
                return Err(climate_common::PipelineError::download("archive offline"));
            }
            self.inner
                .fetch(variables, year, month, days, times, dest)
                .await
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        root_dir: dir.path().to_path_buf(),
        derive: DeriveConfig {
            resolution: 45.0,
            canvas_width: 8,
            canvas_height: 4,
            ..DeriveConfig::default()
        },
        ..PipelineConfig::default()
    };
    let land = LandMask::from_rings(vec![vec![
        (-300.0, -80.0),
        (300.0, -80.0),
        (300.0, 80.0),
        (-300.0, 80.0),
        (-300.0, -80.0),
    ]]);
    let layout = DataLayout::new(dir.path());
    let orchestrator = Orchestrator::new(
        config,
        FlakySource {
            inner: MockSource::new(),
        },
        SoftwareBackend::new(land),
        false,
    );

    let summary = orchestrator.run(&request(&["2015", "2016"], false)).await.unwrap();
    assert!(!summary.is_success());
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.succeeded.len(), 1);

    // 2016 completed despite the 2015 failure.
    let vars = VariableSet::new(["ssrd"]).unwrap();
    let p2016 = RangePeriod::for_month("2016", "03").unwrap();
    assert!(layout.mean_path(&vars, &p2016).exists());
    let p2015 = RangePeriod::for_month("2015", "03").unwrap();
    assert!(!layout.download_path(&vars, &p2015).exists());
}
