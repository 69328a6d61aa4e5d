//! Deterministic artifact paths for every (stage, variable-set, period).
//!
//! The directory convention is `<root>/<variable-set-key>/<stage>/<name>`,
//! with `geotiffs/` and `png/` subfolders per stage for derived raster and
//! image artifacts. The names are a compatibility contract with existing
//! archives and must not change.

use std::path::{Path, PathBuf};

use climate_common::{MonthBucket, RangePeriod, VariableSet};

/// Pipeline stages with materialized outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Downloads,
    MonthlyMeans,
    LongTermAverages,
    MonthlyAnomalies,
}

impl Stage {
    /// On-disk directory name for this stage.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Stage::Downloads => "downloads",
            Stage::MonthlyMeans => "monthly_means",
            Stage::LongTermAverages => "long-term_averages",
            Stage::MonthlyAnomalies => "monthly_anomalies",
        }
    }
}

/// States of the raster derivation chain, in execution order.
///
/// Each state appends its suffix to the previous one, so a masked raster
/// for `mean_<p>` is `mean_<p>_NULL_res_mask.tif` and the final image is
/// `mean_<p>_NULL_res_mask.png` under the stage's `png/` folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterStep {
    Normalized,
    NodataMarked,
    Resampled,
    Masked,
    Image,
}

impl RasterStep {
    /// All raster steps, in dependency order.
    pub const ALL: [RasterStep; 5] = [
        RasterStep::Normalized,
        RasterStep::NodataMarked,
        RasterStep::Resampled,
        RasterStep::Masked,
        RasterStep::Image,
    ];

    /// Cumulative filename suffix up to and including this step.
    pub fn suffix(&self) -> &'static str {
        match self {
            RasterStep::Normalized => "",
            RasterStep::NodataMarked => "_NULL",
            RasterStep::Resampled => "_NULL_res",
            RasterStep::Masked | RasterStep::Image => "_NULL_res_mask",
        }
    }

    /// The step whose output this step reads, if any.
    pub fn input(&self) -> Option<RasterStep> {
        match self {
            RasterStep::Normalized => None,
            RasterStep::NodataMarked => Some(RasterStep::Normalized),
            RasterStep::Resampled => Some(RasterStep::NodataMarked),
            RasterStep::Masked => Some(RasterStep::Resampled),
            RasterStep::Image => Some(RasterStep::Masked),
        }
    }
}

/// Maps (stage, variable-set, period) to deterministic file paths.
///
/// Pure path arithmetic; nothing here touches the filesystem.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<variable-set-key>/<stage>/`
    pub fn stage_dir(&self, vars: &VariableSet, stage: Stage) -> PathBuf {
        self.root.join(vars.key()).join(stage.dir_name())
    }

    /// Raw download: `downloads/download_<start>_to_<end>.nc`
    pub fn download_path(&self, vars: &VariableSet, period: &RangePeriod) -> PathBuf {
        self.stage_dir(vars, Stage::Downloads)
            .join(format!("download_{}.nc", period.key()))
    }

    /// Stem (filename without extension) for a monthly mean artifact.
    pub fn mean_stem(period: &RangePeriod) -> String {
        format!("mean_{}", period.key())
    }

    /// Monthly mean: `monthly_means/mean_<period>.nc`
    pub fn mean_path(&self, vars: &VariableSet, period: &RangePeriod) -> PathBuf {
        self.stage_dir(vars, Stage::MonthlyMeans)
            .join(format!("{}.nc", Self::mean_stem(period)))
    }

    /// Stem for a long-term average artifact (`lt_average` for all-time).
    pub fn longterm_stem(bucket: &MonthBucket) -> String {
        match bucket {
            MonthBucket::All => "lt_average".to_string(),
            MonthBucket::Month(m) => format!("lt_average_{m}"),
        }
    }

    /// Long-term average: `long-term_averages/lt_average[_<MM>].nc`
    pub fn longterm_path(&self, vars: &VariableSet, bucket: &MonthBucket) -> PathBuf {
        self.stage_dir(vars, Stage::LongTermAverages)
            .join(format!("{}.nc", Self::longterm_stem(bucket)))
    }

    /// Stem for an anomaly artifact (`anomaly_year_<p>` for the all-time
    /// baseline, `anomaly_month<MM>_<p>` otherwise).
    pub fn anomaly_stem(bucket: &MonthBucket, period: &RangePeriod) -> String {
        match bucket {
            MonthBucket::All => format!("anomaly_year_{}", period.key()),
            MonthBucket::Month(m) => format!("anomaly_month{}_{}", m, period.key()),
        }
    }

    /// Anomaly: `monthly_anomalies/anomaly_month<MM>_<period>.nc`
    pub fn anomaly_path(
        &self,
        vars: &VariableSet,
        bucket: &MonthBucket,
        period: &RangePeriod,
    ) -> PathBuf {
        self.stage_dir(vars, Stage::MonthlyAnomalies)
            .join(format!("{}.nc", Self::anomaly_stem(bucket, period)))
    }

    /// Raster derivative for a stage artifact stem.
    ///
    /// Intermediate steps land in `<stage>/geotiffs/<stem><suffix>.tif`,
    /// the final image in `<stage>/png/<stem>_NULL_res_mask.png`.
    pub fn raster_path(
        &self,
        vars: &VariableSet,
        stage: Stage,
        stem: &str,
        step: RasterStep,
    ) -> PathBuf {
        let stage_dir = self.stage_dir(vars, stage);
        match step {
            RasterStep::Image => stage_dir
                .join("png")
                .join(format!("{stem}{}.png", step.suffix())),
            _ => stage_dir
                .join("geotiffs")
                .join(format!("{stem}{}.tif", step.suffix())),
        }
    }
}
