//! Planar tether angles around the AVCanal reference points.
//!
//! The AVCanal is annotated as three points: an atrial end, the canal itself
//! and a ventricular end. Each tether is described by its depth and by the
//! xy-angle between the chamber's reference axis (chamber end toward the
//! canal) and the vector from the chamber end to the tether.

use std::str::FromStr;

use nalgebra::{Point3, Vector2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TethermapError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chamber {
    Atrium,
    Ventricle,
}

impl Chamber {
    /// Index of the reference point the chamber's angles are measured about.
    fn pivot_index(&self) -> usize {
        match self {
            Chamber::Atrium => 0,
            Chamber::Ventricle => 2,
        }
    }
}

impl FromStr for Chamber {
    type Err = TethermapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim_start_matches("tether_") {
            "Atrium" => Ok(Chamber::Atrium),
            "Ventricle" => Ok(Chamber::Ventricle),
            other => Err(TethermapError::InvalidArgument(format!(
                "'{other}' is not a chamber"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarAngle {
    pub z: f64,
    pub angle_deg: f64,
}

/// Signed angle from `from` to `to` in radians, in [-π, π].
pub fn signed_angle_2d(from: &Vector2<f64>, to: &Vector2<f64>) -> f64 {
    let det = from.x * to.y - from.y * to.x;
    det.atan2(from.dot(to))
}

/// Angles of `tethers` about the chamber's AVCanal reference axis.
pub fn reference_angles(
    references: &[Point3<f64>],
    chamber: Chamber,
    tethers: &[Point3<f64>],
) -> Result<Vec<PlanarAngle>> {
    if references.len() != 3 {
        return Err(TethermapError::InvalidArgument(format!(
            "expected 3 AVCanal reference points, got {}",
            references.len()
        )));
    }
    let pivot = references[chamber.pivot_index()].xy();
    let axis = references[1].xy() - pivot;
    if axis.norm() == 0.0 {
        return Err(TethermapError::DegenerateCurve(format!(
            "{chamber:?} reference axis has zero length"
        )));
    }

    Ok(tethers
        .iter()
        .map(|t| PlanarAngle {
            z: t.z,
            angle_deg: signed_angle_2d(&axis, &(t.xy() - pivot)).to_degrees(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn references() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 10.0),
            Point3::new(10.0, 0.0, 12.0),
            Point3::new(20.0, 0.0, 14.0),
        ]
    }

    #[test]
    fn test_signed_angle_2d() {
        let x = Vector2::new(1.0, 0.0);
        assert_relative_eq!(signed_angle_2d(&x, &Vector2::new(0.0, 1.0)), std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(signed_angle_2d(&x, &x), 0.0);
        assert_relative_eq!(signed_angle_2d(&x, &Vector2::new(-1.0, 0.0)), std::f64::consts::PI);
    }

    #[test]
    fn test_atrium_measured_about_first_reference() {
        let tethers = vec![Point3::new(0.0, 5.0, 3.0), Point3::new(5.0, -5.0, 4.0)];
        let angles = reference_angles(&references(), Chamber::Atrium, &tethers).unwrap();
        assert_eq!(angles[0].z, 3.0);
        assert_relative_eq!(angles[0].angle_deg, 90.0, epsilon = 1e-9);
        assert_relative_eq!(angles[1].angle_deg, -45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ventricle_measured_about_last_reference() {
        let tethers = vec![Point3::new(20.0, 5.0, 1.0)];
        let angles = reference_angles(&references(), Chamber::Ventricle, &tethers).unwrap();
        // axis points from (20, 0) back toward (10, 0)
        assert_relative_eq!(angles[0].angle_deg, -90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_needs_three_references() {
        let err = reference_angles(&references()[..2], Chamber::Atrium, &[]).unwrap_err();
        assert!(matches!(err, TethermapError::InvalidArgument(_)));
    }

    #[test]
    fn test_chamber_from_object_id() {
        assert_eq!("tether_Atrium".parse::<Chamber>().unwrap(), Chamber::Atrium);
        assert_eq!("Ventricle".parse::<Chamber>().unwrap(), Chamber::Ventricle);
        assert!("AVCanal".parse::<Chamber>().is_err());
    }
}
