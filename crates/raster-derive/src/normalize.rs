//! Longitude renormalization and grid-to-raster conversion.

use climate_common::{Grid, PipelineError, PipelineResult};

use crate::raster::GeoRaster;

/// Shift longitudes from [0, 360) to [-180, 180) via
/// `((lon + 180) mod 360) - 180` and sort columns ascending.
///
/// Already-normalized grids pass through unchanged apart from the sort.
pub fn normalize_longitudes(grid: &Grid) -> PipelineResult<Grid> {
    let shifted: Vec<f64> = grid
        .longitudes
        .iter()
        .map(|&l| (l + 180.0).rem_euclid(360.0) - 180.0)
        .collect();

    // Argsort ascending, then permute every slab's columns to match.
    let mut order: Vec<usize> = (0..shifted.len()).collect();
    order.sort_by(|&a, &b| shifted[a].total_cmp(&shifted[b]));

    let longitudes: Vec<f64> = order.iter().map(|&i| shifted[i]).collect();

    let n_lon = grid.n_lon();
    let mut values = Vec::with_capacity(grid.values.len());
    for t in 0..grid.steps() {
        let slab = grid.slab(t);
        for j in 0..grid.n_lat() {
            let row = &slab[j * n_lon..(j + 1) * n_lon];
            values.extend(order.iter().map(|&i| row[i]));
        }
    }

    Grid::new(
        grid.variable.clone(),
        grid.latitudes.clone(),
        longitudes,
        grid.times.clone(),
        values,
    )
}

/// Convert a normalized, reduced grid into a georeferenced raster tagged
/// with `crs`.
///
/// Requires at least a 2x2 grid (pixel size is inferred from coordinate
/// spacing) with ascending longitudes. Rows are emitted north to south.
pub fn grid_to_raster(grid: &Grid, crs: &str) -> PipelineResult<GeoRaster> {
    if !grid.is_reduced() {
        return Err(PipelineError::backend(format!(
            "raster conversion needs a reduced grid, got {}",
            grid.shape_desc()
        )));
    }
    if grid.n_lat() < 2 || grid.n_lon() < 2 {
        return Err(PipelineError::backend(format!(
            "grid too small for raster conversion: {}",
            grid.shape_desc()
        )));
    }
    if grid.longitudes.windows(2).any(|w| w[0] >= w[1]) {
        return Err(PipelineError::backend(
            "longitudes must be normalized and sorted ascending",
        ));
    }

    let n_lat = grid.n_lat();
    let n_lon = grid.n_lon();
    let dx = (grid.longitudes[n_lon - 1] - grid.longitudes[0]) / (n_lon - 1) as f64;
    let (lat_min, lat_max) = {
        let first = grid.latitudes[0];
        let last = grid.latitudes[n_lat - 1];
        (first.min(last), first.max(last))
    };
    let dy = (lat_max - lat_min) / (n_lat - 1) as f64;

    // Rows north to south regardless of the stored latitude direction.
    let north_first = grid.latitudes[0] >= grid.latitudes[n_lat - 1];
    let mut values = Vec::with_capacity(grid.values.len());
    for row in 0..n_lat {
        let j = if north_first { row } else { n_lat - 1 - row };
        values.extend_from_slice(&grid.slab(0)[j * n_lon..(j + 1) * n_lon]);
    }

    let raster = GeoRaster {
        crs: crs.to_string(),
        west: grid.longitudes[0] - dx / 2.0,
        north: lat_max + dy / 2.0,
        dx,
        dy,
        width: n_lon,
        height: n_lat,
        nodata: None,
        values,
    };
    raster.validate()?;
    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_range_and_monotonicity() {
        let grid = Grid::reduced(
            "ssrd",
            vec![10.0],
            vec![0.0, 90.0, 180.0, 270.0],
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        let norm = normalize_longitudes(&grid).unwrap();

        assert!(norm.longitudes.iter().all(|&l| (-180.0..180.0).contains(&l)));
        assert!(norm.longitudes.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(norm.longitudes, vec![-180.0, -90.0, 0.0, 90.0]);
        // Columns moved with their coordinates: 180 -> -180 carries value 3.
        assert_eq!(norm.values, vec![3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn test_normalize_identity_for_sorted_grid() {
        let grid = Grid::reduced("ssrd", vec![10.0], vec![-90.0, 0.0, 90.0], vec![1.0, 2.0, 3.0])
            .unwrap();
        let norm = normalize_longitudes(&grid).unwrap();
        assert_eq!(norm.longitudes, grid.longitudes);
        assert_eq!(norm.values, grid.values);
    }

    #[test]
    fn test_grid_to_raster_orientation() {
        // Latitudes stored south-first; raster must come out north-first.
        let grid = Grid::reduced(
            "ssrd",
            vec![-10.0, 10.0],
            vec![0.0, 20.0],
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        let raster = grid_to_raster(&grid, "EPSG:4326").unwrap();

        assert_eq!(raster.crs, "EPSG:4326");
        assert_eq!(raster.values, vec![3.0, 4.0, 1.0, 2.0]);
        assert_eq!(raster.dx, 20.0);
        assert_eq!(raster.dy, 20.0);
        assert_eq!(raster.west, -10.0);
        assert_eq!(raster.north, 20.0);
    }

    #[test]
    fn test_grid_to_raster_rejects_unsorted() {
        let grid = Grid::reduced(
            "ssrd",
            vec![0.0, 10.0],
            vec![20.0, 0.0],
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        assert!(grid_to_raster(&grid, "EPSG:4326").is_err());
    }
}
