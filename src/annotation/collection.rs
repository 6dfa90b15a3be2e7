use std::collections::BTreeMap;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use super::{validate_row, PointRow};
use crate::error::{Result, TethermapError};

/// Physical size of one voxel along x, y and z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelSize {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for PixelSize {
    fn default() -> Self {
        Self {
            x: 0.41,
            y: 0.41,
            z: 2.0,
        }
    }
}

impl PixelSize {
    /// Scales `x`, `y` and the plane index; the phase is left untouched.
    pub fn scale_row(&self, row: &PointRow) -> PointRow {
        [row[0] * self.x, row[1] * self.y, row[2] * self.z, row[3]]
    }
}

/// Rows of every object keyed by object id.
///
/// This is the hand-off between the annotation layer and the curve pipeline.
/// The pipeline assumes the rows are already in physical units, see
/// [`PointCollection::to_physical`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointCollection {
    objects: BTreeMap<String, Vec<PointRow>>,
}

impl PointCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object_id: &str, rows: Vec<PointRow>) {
        self.objects.insert(object_id.to_string(), rows);
    }

    pub fn from_map(objects: BTreeMap<String, Vec<PointRow>>) -> Result<Self> {
        for rows in objects.values() {
            for row in rows {
                validate_row(row)?;
            }
        }
        Ok(Self { objects })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn rows(&self, object_id: &str) -> Result<&[PointRow]> {
        self.objects
            .get(object_id)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                TethermapError::InvalidArgument(format!("unknown object id '{object_id}'"))
            })
    }

    /// Distinct phases recorded for `object_id`, ascending.
    pub fn phases(&self, object_id: &str) -> Result<Vec<i64>> {
        let mut phases: Vec<i64> = self
            .rows(object_id)?
            .iter()
            .map(|row| phase_of(row))
            .collect();
        phases.sort_unstable();
        phases.dedup();
        Ok(phases)
    }

    /// Positions of `object_id` recorded in `phase`, in storage order.
    pub fn points_in_phase(&self, object_id: &str, phase: i64) -> Result<Vec<Point3<f64>>> {
        Ok(self
            .rows(object_id)?
            .iter()
            .filter(|row| phase_of(row) == phase)
            .map(|row| Point3::new(row[0], row[1], row[2]))
            .collect())
    }

    /// Copy with every row scaled by `pixel_size`.
    pub fn to_physical(&self, pixel_size: &PixelSize) -> Self {
        let objects = self
            .objects
            .iter()
            .map(|(id, rows)| {
                (
                    id.clone(),
                    rows.iter().map(|row| pixel_size.scale_row(row)).collect(),
                )
            })
            .collect();
        Self { objects }
    }
}

fn phase_of(row: &PointRow) -> i64 {
    row[3].round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_physical_leaves_phase_alone() {
        let mut collection = PointCollection::new();
        collection.insert("Midline", vec![[10.0, 20.0, 3.0, 2.0]]);
        let physical = collection.to_physical(&PixelSize::default());
        let row = physical.rows("Midline").unwrap()[0];
        assert!((row[0] - 4.1).abs() < 1e-12);
        assert!((row[1] - 8.2).abs() < 1e-12);
        assert_eq!(row[2], 6.0);
        assert_eq!(row[3], 2.0);
    }

    #[test]
    fn test_phases_sorted_and_unique() {
        let mut collection = PointCollection::new();
        collection.insert(
            "Midline",
            vec![
                [0.0, 0.0, 0.0, 2.0],
                [0.0, 0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0, 2.0],
            ],
        );
        assert_eq!(collection.phases("Midline").unwrap(), vec![0, 2]);
        let pts = collection.points_in_phase("Midline", 2).unwrap();
        assert_eq!(pts, vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)]);
    }

    #[test]
    fn test_from_map_rejects_non_finite() {
        let mut map = BTreeMap::new();
        map.insert("A".to_string(), vec![[0.0, f64::INFINITY, 0.0, 0.0]]);
        assert!(PointCollection::from_map(map).is_err());
    }
}
