//! Value classification and color-ramp rendering.
//!
//! Breakpoint policy is product-dependent and carried by the product
//! variant, never re-derived from artifact names: mean fields use
//! data-driven cutoffs over the observed min-max range, anomaly fields use
//! fixed absolute thresholds so imagery is comparable across periods.

use climate_common::{PipelineError, PipelineResult};

use crate::raster::GeoRaster;

/// Default anomaly thresholds, in percent.
pub const DEFAULT_ANOMALY_BREAKPOINTS: [f64; 5] = [-20.0, -10.0, 0.0, 10.0, 20.0];

/// Ramp colors, low to high: red, orange, yellow, light green, green.
pub const RAMP_COLORS: [Color; 5] = [
    Color::new(255, 0, 0),
    Color::new(255, 165, 0),
    Color::new(255, 255, 0),
    Color::new(144, 238, 144),
    Color::new(0, 128, 0),
];

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// The kind of derived product being classified, carrying its breakpoint
/// strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Product {
    /// Mean field: cutoffs at 0/25/50/75/100% of the observed range.
    Mean,
    /// Anomaly field: fixed absolute thresholds, data-independent.
    Anomaly { breakpoints: [f64; 5] },
}

impl Product {
    /// Anomaly product with the default thresholds.
    pub fn anomaly() -> Self {
        Self::Anomaly {
            breakpoints: DEFAULT_ANOMALY_BREAKPOINTS,
        }
    }

    /// Compute the five breakpoints for a raster.
    ///
    /// A mean field with no valid cell has no range to classify, which is
    /// `InsufficientData`; anomaly breakpoints never depend on the data.
    pub fn breakpoints(&self, raster: &GeoRaster) -> PipelineResult<[f64; 5]> {
        match self {
            Product::Anomaly { breakpoints } => Ok(*breakpoints),
            Product::Mean => {
                let (min, max) = raster.value_range().ok_or_else(|| {
                    PipelineError::insufficient_data("no valid cells to classify")
                })?;
                let r = max - min;
                Ok([
                    min,
                    min + 0.25 * r,
                    min + 0.50 * r,
                    min + 0.75 * r,
                    max,
                ])
            }
        }
    }
}

/// A five-stop interpolated color ramp.
#[derive(Debug, Clone)]
pub struct ColorRamp {
    stops: [(f64, Color); 5],
}

impl ColorRamp {
    /// Build the ramp for a product over a raster.
    pub fn for_product(product: Product, raster: &GeoRaster) -> PipelineResult<Self> {
        let breakpoints = product.breakpoints(raster)?;
        let mut stops = [(0.0, RAMP_COLORS[0]); 5];
        for (i, (&bp, &color)) in breakpoints.iter().zip(RAMP_COLORS.iter()).enumerate() {
            stops[i] = (bp, color);
        }
        Ok(Self { stops })
    }

    pub fn stops(&self) -> &[(f64, Color); 5] {
        &self.stops
    }

    /// Color for a value; linear interpolation in value space between
    /// stops, clamped at the ends. Non-finite values have no color.
    pub fn color_at(&self, value: f64) -> Option<Color> {
        if !value.is_finite() {
            return None;
        }
        let (first, last) = (self.stops[0], self.stops[4]);
        if value <= first.0 {
            return Some(first.1);
        }
        if value >= last.0 {
            return Some(last.1);
        }
        for pair in self.stops.windows(2) {
            let (lo, lo_color) = pair[0];
            let (hi, hi_color) = pair[1];
            if value <= hi {
                let t = if hi > lo { (value - lo) / (hi - lo) } else { 0.0 };
                return Some(lerp(lo_color, hi_color, t));
            }
        }
        Some(last.1)
    }
}

fn lerp(a: Color, b: Color, t: f64) -> Color {
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    Color::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
}

/// Render a raster onto a fixed-size RGBA canvas through a color ramp.
///
/// The raster extent is stretched to the canvas; missing cells come out
/// fully transparent.
pub fn render_rgba(
    raster: &GeoRaster,
    ramp: &ColorRamp,
    width: usize,
    height: usize,
) -> Vec<u8> {
    let mut pixels = vec![0u8; width * height * 4];
    for y in 0..height {
        // Nearest source row for this canvas row.
        let src_y = ((y as f64 + 0.5) / height as f64 * raster.height as f64) as usize;
        let src_y = src_y.min(raster.height - 1);
        for x in 0..width {
            let src_x = ((x as f64 + 0.5) / width as f64 * raster.width as f64) as usize;
            let src_x = src_x.min(raster.width - 1);
            let v = raster.at(src_x, src_y);
            if raster.is_missing(v) {
                continue;
            }
            if let Some(color) = ramp.color_at(v) {
                let off = (y * width + x) * 4;
                pixels[off] = color.r;
                pixels[off + 1] = color.g;
                pixels[off + 2] = color.b;
                pixels[off + 3] = 255;
            }
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(values: Vec<f64>) -> GeoRaster {
        let width = values.len();
        GeoRaster {
            crs: "EPSG:4326".into(),
            west: 0.0,
            north: 1.0,
            dx: 1.0,
            dy: 1.0,
            width,
            height: 1,
            nodata: Some(-9999.0),
            values,
        }
    }

    #[test]
    fn test_mean_breakpoints_span_range() {
        let r = raster(vec![0.0, 40.0, 100.0]);
        let bp = Product::Mean.breakpoints(&r).unwrap();
        assert_eq!(bp, [0.0, 25.0, 50.0, 75.0, 100.0]);
    }

    #[test]
    fn test_anomaly_breakpoints_ignore_data() {
        let r = raster(vec![-500.0, 700.0]);
        let bp = Product::anomaly().breakpoints(&r).unwrap();
        assert_eq!(bp, DEFAULT_ANOMALY_BREAKPOINTS);
    }

    #[test]
    fn test_mean_without_valid_cells() {
        let r = raster(vec![-9999.0, f64::NAN]);
        assert!(matches!(
            Product::Mean.breakpoints(&r),
            Err(PipelineError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_color_interpolation_and_clamp() {
        let r = raster(vec![0.0, 100.0]);
        let ramp = ColorRamp::for_product(Product::Mean, &r).unwrap();

        assert_eq!(ramp.color_at(0.0), Some(RAMP_COLORS[0]));
        assert_eq!(ramp.color_at(100.0), Some(RAMP_COLORS[4]));
        assert_eq!(ramp.color_at(-50.0), Some(RAMP_COLORS[0]));
        assert_eq!(ramp.color_at(500.0), Some(RAMP_COLORS[4]));
        // Halfway between red and orange.
        assert_eq!(ramp.color_at(12.5), Some(Color::new(255, 83, 0)));
        assert_eq!(ramp.color_at(f64::INFINITY), None);
        assert_eq!(ramp.color_at(f64::NAN), None);
    }

    #[test]
    fn test_render_transparent_for_missing() {
        let r = raster(vec![50.0, -9999.0]);
        let ramp = ColorRamp::for_product(Product::anomaly(), &r).unwrap();
        let pixels = render_rgba(&r, &ramp, 2, 1);
        assert_eq!(pixels[3], 255); // valid cell opaque
        assert_eq!(pixels[7], 0); // missing cell transparent
    }
}
