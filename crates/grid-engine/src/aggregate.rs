//! Temporal aggregation over raw downloads.

use std::path::{Path, PathBuf};

use climate_common::{Grid, MonthBucket, PipelineError, PipelineResult, RangePeriod};
use tracing::debug;

/// Arithmetic mean across the time dimension of every input grid.
///
/// Missing values (NaN) are excluded per cell from both the numerator and
/// the denominator; a cell with no finite sample at all comes out NaN. All
/// inputs must share coordinates (`GridAlignment` otherwise) and an empty
/// input set is `InsufficientData` — never a silently-empty output.
pub fn temporal_mean(grids: &[Grid], what: &str) -> PipelineResult<Grid> {
    let first = grids
        .first()
        .ok_or_else(|| PipelineError::insufficient_data(what.to_string()))?;

    let cells = first.n_lat() * first.n_lon();
    let mut sums = vec![0.0f64; cells];
    let mut counts = vec![0u32; cells];

    for grid in grids {
        first.require_aligned(grid)?;
        for t in 0..grid.steps() {
            let slab = grid.slab(t);
            for (cell, &v) in slab.iter().enumerate() {
                if v.is_finite() {
                    sums[cell] += v;
                    counts[cell] += 1;
                }
            }
        }
    }

    let values: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(&s, &c)| if c > 0 { s / c as f64 } else { f64::NAN })
        .collect();

    Grid::reduced(
        first.variable.clone(),
        first.latitudes.clone(),
        first.longitudes.clone(),
        values,
    )
}

/// Monthly mean of a single raw download.
pub fn monthly_mean(download: &Grid, period: &RangePeriod) -> PipelineResult<Grid> {
    temporal_mean(
        std::slice::from_ref(download),
        &format!("monthly mean for {period}"),
    )
}

/// Long-term (climatological) average over every download in a month
/// bucket; `MonthBucket::All` reduces every download into the all-time
/// baseline.
pub fn longterm_average(downloads: &[Grid], bucket: &MonthBucket) -> PipelineResult<Grid> {
    let what = match bucket {
        MonthBucket::All => "all-time baseline".to_string(),
        MonthBucket::Month(m) => format!("long-term average for month {m}"),
    };
    temporal_mean(downloads, &what)
}

/// Download artifacts in `downloads_dir` whose embedded period falls in
/// `bucket`, sorted by filename.
///
/// Matching is by the `download_<YYYYMMDD>_to_<YYYYMMDD>.nc` naming
/// contract; files that do not parse are skipped.
pub fn matching_downloads(
    downloads_dir: &Path,
    bucket: &MonthBucket,
) -> PipelineResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    if !downloads_dir.is_dir() {
        return Ok(paths);
    }

    for entry in std::fs::read_dir(downloads_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(period) = download_period(name) else {
            debug!(file = name, "skipping non-download file");
            continue;
        };
        if bucket.matches(&period) {
            paths.push(entry.path());
        }
    }

    paths.sort();
    Ok(paths)
}

/// Extract the range period from a `download_<p>.nc` filename.
fn download_period(filename: &str) -> Option<RangePeriod> {
    let stem = filename.strip_suffix(".nc")?;
    let key = stem.strip_prefix("download_")?;
    RangePeriod::parse(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(times: usize, values: Vec<f64>) -> Grid {
        let labels = (0..times).map(|t| format!("t{t}")).collect();
        Grid::new("ssrd", vec![10.0], vec![0.0, 1.0], labels, values).unwrap()
    }

    #[test]
    fn test_mean_skips_missing() {
        // Time series [10, NaN, 20] at cell 0; all-NaN at cell 1.
        let g = grid(3, vec![10.0, f64::NAN, f64::NAN, f64::NAN, 20.0, f64::NAN]);
        let mean = temporal_mean(&[g], "test").unwrap();
        assert_eq!(mean.values[0], 15.0);
        assert!(mean.values[1].is_nan());
        assert!(mean.is_reduced());
    }

    #[test]
    fn test_mean_across_multiple_grids() {
        let a = grid(1, vec![1.0, 3.0]);
        let b = grid(2, vec![2.0, 5.0, 3.0, 7.0]);
        let mean = temporal_mean(&[a, b], "test").unwrap();
        assert_eq!(mean.values, vec![2.0, 5.0]);
    }

    #[test]
    fn test_empty_input_is_insufficient_data() {
        let err = temporal_mean(&[], "march baseline").unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData(_)));
    }

    #[test]
    fn test_misaligned_inputs_rejected() {
        let a = grid(1, vec![1.0, 2.0]);
        let b = Grid::new("ssrd", vec![11.0], vec![0.0, 1.0], vec!["t0".into()], vec![1.0, 2.0])
            .unwrap();
        assert!(matches!(
            temporal_mean(&[a, b], "test"),
            Err(PipelineError::GridAlignment { .. })
        ));
    }

    #[test]
    fn test_matching_downloads_by_month() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "download_20150301_to_20150331.nc",
            "download_20160301_to_20160331.nc",
            "download_20160401_to_20160430.nc",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let march = matching_downloads(dir.path(), &MonthBucket::Month("03".into())).unwrap();
        assert_eq!(march.len(), 2);
        assert!(march.iter().all(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains("03"))
        }));

        let all = matching_downloads(dir.path(), &MonthBucket::All).unwrap();
        assert_eq!(all.len(), 3);
    }
}
