pub mod reference_angles;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::centerline::{Midline, MovingFrame, ResampledCurve};
use crate::error::{Result, TethermapError};

const MIN_OFFSET_NORM: f64 = 1e-12;

/// Curve-relative coordinates of one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Index of the nearest curve sample, which is its arc length in
    /// physical units.
    pub arc_length: f64,
    /// `arc_length` divided by the index of the last sample, in [0, 1].
    pub position: f64,
    /// Signed angle of the offset around the tangent, 0 along the normal
    /// and positive toward the binormal, in (-180, 180].
    pub angle_deg: f64,
    /// Distance from the point to the nearest sample.
    pub distance: f64,
    /// More than one sample was equally close; the first one was used.
    pub ambiguous: bool,
}

/// A landmark projected onto the midline of its phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub object_id: String,
    pub phase: i64,
    pub arc_length: f64,
    pub position: f64,
    pub angle_deg: f64,
    pub distance: f64,
    pub ambiguous: bool,
}

impl ProjectedPoint {
    pub fn new(object_id: &str, phase: i64, projection: Projection) -> Self {
        Self {
            object_id: object_id.to_string(),
            phase,
            arc_length: projection.arc_length,
            position: projection.position,
            angle_deg: projection.angle_deg,
            distance: projection.distance,
            ambiguous: projection.ambiguous,
        }
    }
}

/// Projects `point` onto `curve` and its `frame`.
///
/// Picks the closest sample (first one on ties), reads its index as the arc
/// length and measures the angle of the offset in the plane spanned by that
/// sample's normal and binormal. A point lying on the curve, or straight
/// ahead along the tangent, has no defined angle and gets 0.
pub fn project(
    point: &Point3<f64>,
    curve: &ResampledCurve,
    frame: &MovingFrame,
) -> Result<Projection> {
    if curve.is_empty() {
        return Err(TethermapError::InvalidArgument(
            "cannot project onto an empty curve".to_string(),
        ));
    }
    if frame.len() != curve.len() {
        return Err(TethermapError::InvalidArgument(format!(
            "frame has {} samples but curve has {}",
            frame.len(),
            curve.len()
        )));
    }
    if !(point.x.is_finite() && point.y.is_finite() && point.z.is_finite()) {
        return Err(TethermapError::InvalidArgument(format!(
            "cannot project non-finite point {point:?}"
        )));
    }

    let mut nearest = 0;
    let mut best = f64::INFINITY;
    let mut ties = 0;
    for (i, sample) in curve.points.iter().enumerate() {
        let d = nalgebra::distance(point, sample);
        if d < best {
            best = d;
            nearest = i;
            ties = 1;
        } else if d == best {
            ties += 1;
        }
    }

    let offset = point - curve.points[nearest];
    let along_normal = offset.dot(&frame.normals[nearest]);
    let along_binormal = offset.dot(&frame.binormals[nearest]);
    let angle_deg = if along_normal.hypot(along_binormal) < MIN_OFFSET_NORM {
        0.0
    } else {
        let deg = along_binormal.atan2(along_normal).to_degrees();
        if deg <= -180.0 {
            deg + 360.0
        } else {
            deg
        }
    };

    let last = curve.len().saturating_sub(1);
    Ok(Projection {
        arc_length: nearest as f64,
        position: if last == 0 {
            0.0
        } else {
            nearest as f64 / last as f64
        },
        angle_deg,
        distance: best,
        ambiguous: ties > 1,
    })
}

impl Midline {
    pub fn project(&self, point: &Point3<f64>) -> Result<Projection> {
        project(point, &self.curve, &self.frame)
    }
}
