use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use super::spline::fit_smoothing_spline;
use super::ResampledCurve;
use crate::error::{Result, TethermapError};

pub const MAX_DEGREE: usize = 5;

fn default_smoothing() -> f64 {
    100.0
}

fn default_degree() -> usize {
    3
}

fn default_length_samples() -> usize {
    10_000
}

/// Parameters of the midline spline fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    /// Budget for the summed squared distance between anchors and the fitted
    /// curve, in squared physical units. 0 interpolates.
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
    /// Polynomial degree of the spline pieces.
    #[serde(default = "default_degree")]
    pub degree: usize,
    /// Number of uniform samples used to estimate the spline length.
    #[serde(default = "default_length_samples")]
    pub length_samples: usize,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            smoothing: default_smoothing(),
            degree: default_degree(),
            length_samples: default_length_samples(),
        }
    }
}

impl FitParams {
    pub fn validate(&self) -> Result<()> {
        if self.degree == 0 || self.degree > MAX_DEGREE {
            return Err(TethermapError::InvalidArgument(format!(
                "spline degree must be in 1..={MAX_DEGREE}, got {}",
                self.degree
            )));
        }
        if !self.smoothing.is_finite() || self.smoothing < 0.0 {
            return Err(TethermapError::InvalidArgument(format!(
                "smoothing must be finite and non-negative, got {}",
                self.smoothing
            )));
        }
        if self.length_samples < 2 {
            return Err(TethermapError::InvalidArgument(format!(
                "length estimate needs at least 2 samples, got {}",
                self.length_samples
            )));
        }
        Ok(())
    }
}

/// Fits the midline anchors of one phase and resamples the spline so that
/// consecutive samples are about one physical unit apart.
///
/// The anchors must already be ordered along the heart tube and scaled to
/// physical units. The sample count is `round(length)`, where the length is
/// measured on a dense uniform sampling of the spline parameter.
pub fn fit_curve(anchors: &[Point3<f64>], params: &FitParams) -> Result<ResampledCurve> {
    params.validate()?;

    let spline = fit_smoothing_spline(anchors, params.degree, params.smoothing)?;
    let dense = spline.sample_uniform(params.length_samples);
    let length = polyline_length(&dense);

    log::debug!(
        "spline length with {} samples: {:.3}",
        params.length_samples,
        length
    );

    let n_points = length.round() as usize;
    if n_points < 2 {
        return Err(TethermapError::DegenerateCurve(format!(
            "fitted spline is {length:.3} units long, too short to resample"
        )));
    }

    Ok(ResampledCurve {
        points: spline.sample_uniform(n_points),
        length,
    })
}

pub fn polyline_length(points: &[Point3<f64>]) -> f64 {
    points
        .windows(2)
        .map(|pair| nalgebra::distance(&pair[0], &pair[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn collinear_anchors() -> Vec<Point3<f64>> {
        (0..5)
            .map(|i| Point3::new(10.0 * i as f64, 0.0, 0.0))
            .collect()
    }

    #[test]
    fn test_collinear_anchors_resample_to_unit_spacing() {
        let curve = fit_curve(&collinear_anchors(), &FitParams::default()).unwrap();
        assert!((curve.len() as i64 - 40).abs() <= 1, "got {}", curve.len());
        assert_relative_eq!(curve.length, 40.0, epsilon = 1e-3);

        let spacing: Vec<f64> = curve
            .points
            .windows(2)
            .map(|w| nalgebra::distance(&w[0], &w[1]))
            .collect();
        for d in spacing {
            assert_relative_eq!(d, 40.0 / 39.0, epsilon = 1e-3);
        }
        for p in &curve.points {
            assert_relative_eq!(p.y, 0.0, epsilon = 1e-6);
            assert_relative_eq!(p.z, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_resampled_curve_keeps_anchor_order() {
        let mut anchors = collinear_anchors();
        anchors.reverse();
        let curve = fit_curve(&anchors, &FitParams::default()).unwrap();
        assert!(curve.points[0].x > curve.points[curve.len() - 1].x);
        for w in curve.points.windows(2) {
            assert!(w[1].x < w[0].x);
        }
    }

    #[test]
    fn test_sample_count_grows_with_anchor_path_length() {
        let base: Vec<Point3<f64>> = (0..7)
            .map(|i| {
                let a = i as f64 * 0.4;
                Point3::new(20.0 * a.cos(), 20.0 * a.sin(), 3.0 * i as f64)
            })
            .collect();
        let params = FitParams {
            smoothing: 5.0,
            ..FitParams::default()
        };

        let mut previous = 0;
        for scale in [1.0, 1.5, 2.0, 3.0, 4.0] {
            let anchors: Vec<_> = base.iter().map(|p| Point3::from(p.coords * scale)).collect();
            let curve = fit_curve(&anchors, &params).unwrap();
            assert!(curve.len() >= previous);
            previous = curve.len();
        }
    }

    #[test]
    fn test_invalid_degree() {
        let params = FitParams {
            degree: 0,
            ..FitParams::default()
        };
        let err = fit_curve(&collinear_anchors(), &params).unwrap_err();
        assert!(matches!(err, TethermapError::InvalidArgument(_)));
    }

    #[test]
    fn test_too_few_anchors() {
        let err = fit_curve(&collinear_anchors()[..3], &FitParams::default()).unwrap_err();
        assert!(matches!(err, TethermapError::InsufficientPoints { .. }));
    }

    #[test]
    fn test_tiny_curve_is_degenerate() {
        let anchors: Vec<_> = (0..4)
            .map(|i| Point3::new(0.1 * i as f64, 0.0, 0.0))
            .collect();
        let err = fit_curve(&anchors, &FitParams::default()).unwrap_err();
        assert!(matches!(err, TethermapError::DegenerateCurve(_)));
    }
}
