pub mod fitting;
pub mod frames;
pub mod preprocessing;
pub mod spline;

use nalgebra::Point3;

use crate::error::Result;
pub use fitting::{fit_curve, FitParams};
pub use frames::{build_frame, FrameMethod, MovingFrame};

/// Midline of one contraction phase sampled at about one physical unit
/// per step.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledCurve {
    pub points: Vec<Point3<f64>>,
    /// Length of the fitted spline estimated on the dense sampling.
    pub length: f64,
}

impl ResampledCurve {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A fitted midline together with its frame, co-indexed sample by sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Midline {
    pub phase: i64,
    pub curve: ResampledCurve,
    pub frame: MovingFrame,
}

/// Fits and frames the midline anchors of a single phase.
pub fn fit_phase(
    phase: i64,
    anchors: &[Point3<f64>],
    params: &FitParams,
    method: FrameMethod,
) -> Result<Midline> {
    let curve = fit_curve(anchors, params)?;
    let frame = build_frame(&curve.points, method)?;
    log::info!(
        "phase {}: midline of {:.2} units, {} samples ({})",
        phase,
        curve.length,
        curve.len(),
        method
    );
    Ok(Midline {
        phase,
        curve,
        frame,
    })
}
