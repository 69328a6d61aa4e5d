//! Bilinear resampling to a fixed target resolution.

use climate_common::{PipelineError, PipelineResult};
use rayon::prelude::*;

use crate::raster::GeoRaster;

/// Resample a raster to `resolution` degrees per pixel using bilinear
/// interpolation.
///
/// Missing cells (nodata, NaN, ±inf) are excluded from the interpolation
/// with the remaining weights renormalized; an output pixel with no valid
/// neighbor becomes nodata (the sentinel when one is set, NaN otherwise).
pub fn resample_bilinear(raster: &GeoRaster, resolution: f64) -> PipelineResult<GeoRaster> {
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(PipelineError::backend(format!(
            "invalid target resolution: {resolution}"
        )));
    }

    let [west, south, east, north] = raster.extent();
    let out_width = (((east - west) / resolution).round() as usize).max(1);
    let out_height = (((north - south) / resolution).round() as usize).max(1);

    let fill = raster.nodata.unwrap_or(f64::NAN);
    let mut values = vec![fill; out_width * out_height];

    values
        .par_chunks_mut(out_width)
        .enumerate()
        .for_each(|(out_y, row)| {
            let lat = north - (out_y as f64 + 0.5) * resolution;
            // Fractional source row for this latitude (pixel-center based).
            let src_y = (raster.north - lat) / raster.dy - 0.5;
            for (out_x, cell) in row.iter_mut().enumerate() {
                let lon = west + (out_x as f64 + 0.5) * resolution;
                let src_x = (lon - raster.west) / raster.dx - 0.5;
                *cell = sample_bilinear(raster, src_x, src_y).unwrap_or(fill);
            }
        });

    Ok(GeoRaster {
        crs: raster.crs.clone(),
        west,
        north,
        dx: resolution,
        dy: resolution,
        width: out_width,
        height: out_height,
        nodata: raster.nodata,
        values,
    })
}

/// Bilinear sample at fractional grid coordinates, skipping missing
/// neighbors. Returns None when all four neighbors are missing.
fn sample_bilinear(raster: &GeoRaster, x: f64, y: f64) -> Option<f64> {
    let clamp_x = |v: f64| v.clamp(0.0, (raster.width - 1) as f64);
    let clamp_y = |v: f64| v.clamp(0.0, (raster.height - 1) as f64);
    let x = clamp_x(x);
    let y = clamp_y(y);

    let x1 = x.floor() as usize;
    let y1 = y.floor() as usize;
    let x2 = (x1 + 1).min(raster.width - 1);
    let y2 = (y1 + 1).min(raster.height - 1);
    let fx = x - x1 as f64;
    let fy = y - y1 as f64;

    let samples = [
        (raster.at(x1, y1), (1.0 - fx) * (1.0 - fy)),
        (raster.at(x2, y1), fx * (1.0 - fy)),
        (raster.at(x1, y2), (1.0 - fx) * fy),
        (raster.at(x2, y2), fx * fy),
    ];

    let mut sum = 0.0;
    let mut weight = 0.0;
    for (v, w) in samples {
        if !raster.is_missing(v) && w > 0.0 {
            sum += v * w;
            weight += w;
        }
    }

    if weight > 0.0 {
        Some(sum / weight)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(width: usize, height: usize, dx: f64, values: Vec<f64>) -> GeoRaster {
        GeoRaster {
            crs: "EPSG:4326".into(),
            west: 0.0,
            north: height as f64 * dx,
            dx,
            dy: dx,
            width,
            height,
            nodata: Some(-9999.0),
            values,
        }
    }

    #[test]
    fn test_upsample_interpolates() {
        // 2x2 grid upsampled 2x; center pixels blend neighbors.
        let r = raster(2, 2, 1.0, vec![0.0, 10.0, 0.0, 10.0]);
        let out = resample_bilinear(&r, 0.5).unwrap();
        assert_eq!(out.width, 4);
        assert_eq!(out.height, 4);
        // Column 0 centers sit west of the first source center: clamped.
        assert_eq!(out.at(0, 0), 0.0);
        assert_eq!(out.at(3, 0), 10.0);
        // Interior columns interpolate between 0 and 10.
        assert!(out.at(1, 1) > 0.0 && out.at(1, 1) < 10.0);
    }

    #[test]
    fn test_identity_resolution_preserves_values() {
        let r = raster(3, 2, 1.0, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let out = resample_bilinear(&r, 1.0).unwrap();
        assert_eq!(out.width, 3);
        assert_eq!(out.height, 2);
        assert_eq!(out.values, r.values);
    }

    #[test]
    fn test_missing_neighbors_are_skipped() {
        let r = raster(2, 2, 1.0, vec![-9999.0, 10.0, -9999.0, 10.0]);
        let out = resample_bilinear(&r, 0.5).unwrap();
        // Pixels with any valid support renormalize to the valid
        // neighbor instead of bleeding the sentinel in.
        assert_eq!(out.at(1, 1), 10.0);
        assert_eq!(out.at(3, 0), 10.0);
        // Pixels supported only by the nodata column become nodata.
        assert_eq!(out.at(0, 0), -9999.0);
        assert!(out.values.iter().all(|&v| v == 10.0 || v == -9999.0));
    }

    #[test]
    fn test_all_missing_yields_nodata() {
        let r = raster(2, 2, 1.0, vec![-9999.0; 4]);
        let out = resample_bilinear(&r, 1.0).unwrap();
        assert!(out.values.iter().all(|&v| v == -9999.0));
    }

    #[test]
    fn test_invalid_resolution() {
        let r = raster(2, 2, 1.0, vec![0.0; 4]);
        assert!(resample_bilinear(&r, 0.0).is_err());
        assert!(resample_bilinear(&r, f64::NAN).is_err());
    }
}
