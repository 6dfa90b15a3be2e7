use std::fmt;
use std::str::FromStr;

use nalgebra::{Point3, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TethermapError};

const MIN_TANGENT_NORM: f64 = 1e-12;
const MIN_CURVATURE_NORM: f64 = 1e-9;
const MIN_AXIS_NORM: f64 = 1e-12;

/// How normals are chosen along the midline.
///
/// `ParallelTransport` rotates the first normal along with the tangent and
/// never turns it by more than the tangent turns, so it is the default.
/// `Frenet` takes each normal from the local derivative of the tangent; it
/// flips sign across inflections and wanders on near-straight runs, and is
/// kept to compare against older analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameMethod {
    Frenet,
    #[default]
    ParallelTransport,
}

impl FromStr for FrameMethod {
    type Err = TethermapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fs" | "frenet" | "frenet-serret" => Ok(FrameMethod::Frenet),
            "pt" | "parallel-transport" | "parallel_transport" => {
                Ok(FrameMethod::ParallelTransport)
            }
            other => Err(TethermapError::InvalidArgument(format!(
                "unknown frame method '{other}'"
            ))),
        }
    }
}

impl fmt::Display for FrameMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameMethod::Frenet => write!(f, "frenet"),
            FrameMethod::ParallelTransport => write!(f, "parallel-transport"),
        }
    }
}

/// Orthonormal frame at every sample of a resampled midline.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingFrame {
    pub tangents: Vec<Vector3<f64>>,
    pub normals: Vec<Vector3<f64>>,
    pub binormals: Vec<Vector3<f64>>,
}

impl MovingFrame {
    pub fn len(&self) -> usize {
        self.tangents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tangents.is_empty()
    }
}

/// Derivative along the sample index with unit spacing: central differences
/// inside, second-order one-sided differences at both ends.
pub fn gradient(values: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
    let n = values.len();
    if n < 3 {
        return vec![Vector3::zeros(); n];
    }
    let mut out = Vec::with_capacity(n);
    out.push((values[0] * -3.0 + values[1] * 4.0 - values[2]) * 0.5);
    for i in 1..n - 1 {
        out.push((values[i + 1] - values[i - 1]) * 0.5);
    }
    out.push((values[n - 1] * 3.0 - values[n - 2] * 4.0 + values[n - 3]) * 0.5);
    out
}

/// Unit tangents of `curve`.
pub fn tangents(curve: &[Point3<f64>]) -> Result<Vec<Vector3<f64>>> {
    if curve.len() < 3 {
        return Err(TethermapError::DegenerateCurve(format!(
            "need at least 3 curve samples for a frame, got {}",
            curve.len()
        )));
    }
    let coords: Vec<Vector3<f64>> = curve.iter().map(|p| p.coords).collect();
    gradient(&coords)
        .into_iter()
        .enumerate()
        .map(|(i, t)| {
            let norm = t.norm();
            if norm < MIN_TANGENT_NORM {
                Err(TethermapError::DegenerateCurve(format!(
                    "zero-length tangent at sample {i}"
                )))
            } else {
                Ok(t / norm)
            }
        })
        .collect()
}

/// Builds tangent, normal and binormal at every sample of `curve`.
pub fn build_frame(curve: &[Point3<f64>], method: FrameMethod) -> Result<MovingFrame> {
    let tangents = tangents(curve)?;
    let curvature = gradient(&tangents);

    let normals = match method {
        FrameMethod::Frenet => frenet_normals(&tangents, &curvature),
        FrameMethod::ParallelTransport => transported_normals(&tangents, &curvature),
    };

    let binormals = tangents
        .iter()
        .zip(&normals)
        .map(|(t, n)| t.cross(n))
        .collect();

    Ok(MovingFrame {
        tangents,
        normals,
        binormals,
    })
}

fn frenet_normals(tangents: &[Vector3<f64>], curvature: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
    let mut normals: Vec<Vector3<f64>> = Vec::with_capacity(tangents.len());
    for (t, k) in tangents.iter().zip(curvature) {
        let fallback = normals.last().copied();
        normals.push(frenet_normal(t, k, fallback));
    }
    normals
}

fn transported_normals(
    tangents: &[Vector3<f64>],
    curvature: &[Vector3<f64>],
) -> Vec<Vector3<f64>> {
    let mut normals = Vec::with_capacity(tangents.len());
    let mut current = frenet_normal(&tangents[0], &curvature[0], None);
    normals.push(current);

    for pair in tangents.windows(2) {
        let (t0, t1) = (&pair[0], &pair[1]);
        let axis = t0.cross(t1);
        if axis.norm() >= MIN_AXIS_NORM {
            let angle = t0.dot(t1).clamp(-1.0, 1.0).acos();
            let rotation = Rotation3::from_axis_angle(&Unit::new_normalize(axis), angle);
            current = rotation * current;
        }
        current = orthonormalize(&current, t1).unwrap_or_else(|| any_perpendicular(t1));
        normals.push(current);
    }
    normals
}

/// Unit component of the tangent derivative orthogonal to the tangent.
/// Where that derivative vanishes the previous normal is reused, or any
/// perpendicular at the start of the curve.
fn frenet_normal(
    tangent: &Vector3<f64>,
    curvature: &Vector3<f64>,
    previous: Option<Vector3<f64>>,
) -> Vector3<f64> {
    let k = curvature - tangent * curvature.dot(tangent);
    if k.norm() >= MIN_CURVATURE_NORM {
        return k.normalize();
    }
    previous
        .and_then(|n| orthonormalize(&n, tangent))
        .unwrap_or_else(|| any_perpendicular(tangent))
}

fn orthonormalize(v: &Vector3<f64>, tangent: &Vector3<f64>) -> Option<Vector3<f64>> {
    let w = v - tangent * v.dot(tangent);
    let norm = w.norm();
    (norm >= MIN_CURVATURE_NORM).then(|| w / norm)
}

/// Unit vector perpendicular to `tangent`, built from the coordinate axis
/// least aligned with it.
fn any_perpendicular(tangent: &Vector3<f64>) -> Vector3<f64> {
    let abs = tangent.abs();
    let axis = if abs.x <= abs.y && abs.x <= abs.z {
        Vector3::x()
    } else if abs.y <= abs.z {
        Vector3::y()
    } else {
        Vector3::z()
    };
    (axis - tangent * axis.dot(tangent)).normalize()
}
