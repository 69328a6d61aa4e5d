//! Percentage anomalies against climatological baselines.

use climate_common::{Grid, PipelineResult};

/// Cell-wise percentage deviation of a monthly mean from its baseline:
/// `(monthly - baseline) / baseline * 100`.
///
/// Division follows IEEE semantics: a zero baseline yields ±infinity, and
/// 0/0 yields NaN. The engine does not clamp or substitute these values;
/// consumers (classification, rendering) treat non-finite cells as missing
/// data. Operands must share coordinates; a mismatch is `GridAlignment`,
/// fatal for the period and not retried.
pub fn percentage_anomaly(monthly: &Grid, baseline: &Grid) -> PipelineResult<Grid> {
    monthly.require_aligned(baseline)?;

    let values: Vec<f64> = monthly
        .values
        .iter()
        .zip(&baseline.values)
        .map(|(&m, &b)| (m - b) / b * 100.0)
        .collect();

    Grid::reduced(
        monthly.variable.clone(),
        monthly.latitudes.clone(),
        monthly.longitudes.clone(),
        values,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use climate_common::PipelineError;

    fn reduced(values: Vec<f64>) -> Grid {
        Grid::reduced("ssrd", vec![10.0], vec![0.0, 1.0, 2.0], values).unwrap()
    }

    #[test]
    fn test_anomaly_formula() {
        let monthly = reduced(vec![250.0, 100.0, 90.0]);
        let baseline = reduced(vec![200.0, 100.0, 100.0]);
        let anomaly = percentage_anomaly(&monthly, &baseline).unwrap();
        assert_eq!(anomaly.values[0], 25.0);
        assert_eq!(anomaly.values[1], 0.0);
        assert!((anomaly.values[2] + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_baseline_is_not_clamped() {
        let monthly = reduced(vec![5.0, -5.0, 0.0]);
        let baseline = reduced(vec![0.0, 0.0, 0.0]);
        let anomaly = percentage_anomaly(&monthly, &baseline).unwrap();
        assert_eq!(anomaly.values[0], f64::INFINITY);
        assert_eq!(anomaly.values[1], f64::NEG_INFINITY);
        assert!(anomaly.values[2].is_nan());
    }

    #[test]
    fn test_misaligned_operands() {
        let monthly = reduced(vec![1.0, 2.0, 3.0]);
        let baseline =
            Grid::reduced("ssrd", vec![20.0], vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            percentage_anomaly(&monthly, &baseline),
            Err(PipelineError::GridAlignment { .. })
        ));
    }
}
