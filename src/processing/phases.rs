use std::collections::BTreeMap;

use crate::annotation::PointCollection;
use nalgebra::Point3;

use crate::centerline::preprocessing::{fix_outliers, smooth_anchors};
use crate::centerline::{fit_phase, FitParams, FrameMethod, Midline};
use crate::config::AnalysisConfig;
use crate::error::{Result, TethermapError};
use crate::projection::reference_angles::{reference_angles, Chamber, PlanarAngle};
use crate::projection::ProjectedPoint;

/// What happened to one contraction phase during aggregation.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome {
    Fitted { samples: usize, length: f64 },
    Skipped(TethermapError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseStatus {
    pub phase: i64,
    pub outcome: PhaseOutcome,
}

/// Projections of every landmark, grouped by `(object id, phase)`, plus the
/// per-phase status list.
#[derive(Debug, Clone, Default)]
pub struct AggregateReport {
    pub statuses: Vec<PhaseStatus>,
    pub projections: BTreeMap<(String, i64), Vec<ProjectedPoint>>,
    pub midlines: BTreeMap<i64, Midline>,
    /// Arc length of the reference landmark in phases where exactly one was
    /// annotated.
    pub reference_positions: BTreeMap<i64, f64>,
    /// Planar tether angles about the reference triplet, keyed by
    /// `(tether id, phase)`, for phases with exactly three reference points.
    pub tether_angles: BTreeMap<(String, i64), Vec<PlanarAngle>>,
}

impl AggregateReport {
    pub fn skipped(&self) -> impl Iterator<Item = (i64, &TethermapError)> {
        self.statuses.iter().filter_map(|s| match &s.outcome {
            PhaseOutcome::Skipped(err) => Some((s.phase, err)),
            PhaseOutcome::Fitted { .. } => None,
        })
    }

    pub fn fitted_phases(&self) -> Vec<i64> {
        self.midlines.keys().copied().collect()
    }

    pub fn points(&self) -> impl Iterator<Item = &ProjectedPoint> {
        self.projections.values().flatten()
    }

    pub fn points_for(&self, object_id: &str, phase: i64) -> &[ProjectedPoint] {
        self.projections
            .get(&(object_id.to_string(), phase))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

struct PhaseResult {
    midline: Midline,
    projections: Vec<(String, Vec<ProjectedPoint>)>,
    reference_position: Option<f64>,
    tether_angles: Vec<(String, Vec<PlanarAngle>)>,
}

/// Runs fit, frame and projection independently for every phase that has
/// midline anchors.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseAggregator {
    pub midline_id: String,
    pub landmark_ids: Vec<String>,
    pub reference_id: Option<String>,
    pub fit: FitParams,
    pub method: FrameMethod,
    pub outlier_threshold: Option<f64>,
    pub anchor_sigma: Option<f64>,
}

impl PhaseAggregator {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            midline_id: config.midline_id.clone(),
            landmark_ids: config.landmark_ids.clone(),
            reference_id: config.reference_id.clone(),
            fit: config.fit,
            method: config.frame_method,
            outlier_threshold: config.outlier_threshold,
            anchor_sigma: config.anchor_sigma,
        }
    }

    /// Applies the configured outlier replacement and smoothing to one
    /// phase's midline anchors.
    pub fn prepare_anchors(&self, anchors: Vec<Point3<f64>>) -> Result<Vec<Point3<f64>>> {
        let mut anchors = anchors;
        if let Some(threshold) = self.outlier_threshold {
            anchors = fix_outliers(&anchors, threshold);
        }
        if let Some(sigma) = self.anchor_sigma {
            anchors = smooth_anchors(&anchors, sigma)?;
        }
        Ok(anchors)
    }

    /// Aggregates a collection already scaled to physical units.
    ///
    /// Fails only when the midline object is missing. Phases that cannot be
    /// fitted are reported in `statuses` and the remaining phases still run.
    pub fn run(&self, collection: &PointCollection) -> Result<AggregateReport> {
        let phases = collection.phases(&self.midline_id)?;
        let mut report = AggregateReport::default();

        for phase in phases {
            match self.run_phase(collection, phase) {
                Ok(result) => {
                    report.statuses.push(PhaseStatus {
                        phase,
                        outcome: PhaseOutcome::Fitted {
                            samples: result.midline.curve.len(),
                            length: result.midline.curve.length,
                        },
                    });
                    for (object_id, points) in result.projections {
                        report.projections.insert((object_id, phase), points);
                    }
                    if let Some(position) = result.reference_position {
                        report.reference_positions.insert(phase, position);
                    }
                    for (object_id, angles) in result.tether_angles {
                        report.tether_angles.insert((object_id, phase), angles);
                    }
                    report.midlines.insert(phase, result.midline);
                }
                Err(err) => {
                    log::warn!("phase {phase} skipped: {err}");
                    report.statuses.push(PhaseStatus {
                        phase,
                        outcome: PhaseOutcome::Skipped(err),
                    });
                }
            }
        }

        log::info!(
            "aggregated {} phases, {} skipped",
            report.statuses.len(),
            report.skipped().count()
        );
        Ok(report)
    }

    fn run_phase(&self, collection: &PointCollection, phase: i64) -> Result<PhaseResult> {
        let anchors = self.prepare_anchors(collection.points_in_phase(&self.midline_id, phase)?)?;
        let midline = fit_phase(phase, &anchors, &self.fit, self.method)?;

        let mut projections = Vec::new();
        let mut reference_position = None;
        for object_id in &self.landmark_ids {
            if collection.rows(object_id).is_err() {
                log::debug!("landmark '{object_id}' not annotated, skipped");
                continue;
            }
            let points = collection.points_in_phase(object_id, phase)?;
            let projected = points
                .iter()
                .map(|p| Ok(ProjectedPoint::new(object_id, phase, midline.project(p)?)))
                .collect::<Result<Vec<_>>>()?;

            if self.reference_id.as_deref() == Some(object_id.as_str()) {
                match projected.as_slice() {
                    [single] => reference_position = Some(single.arc_length),
                    [] | [_, _, _] => {}
                    many => log::warn!(
                        "phase {phase}: {} '{object_id}' points, expected one",
                        many.len()
                    ),
                }
            }
            projections.push((object_id.clone(), projected));
        }

        let tether_angles = self.tether_angles(collection, phase).unwrap_or_else(|err| {
            log::warn!("phase {phase}: tether angles not computed: {err}");
            Vec::new()
        });

        Ok(PhaseResult {
            midline,
            projections,
            reference_position,
            tether_angles,
        })
    }

    fn tether_angles(
        &self,
        collection: &PointCollection,
        phase: i64,
    ) -> Result<Vec<(String, Vec<PlanarAngle>)>> {
        let Some(reference_id) = self.reference_id.as_deref() else {
            return Ok(Vec::new());
        };
        if collection.rows(reference_id).is_err() {
            return Ok(Vec::new());
        }
        let references = collection.points_in_phase(reference_id, phase)?;
        if references.len() != 3 {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for object_id in &self.landmark_ids {
            let Ok(chamber) = object_id.parse::<Chamber>() else {
                continue;
            };
            if collection.rows(object_id).is_err() {
                continue;
            }
            let tethers = collection.points_in_phase(object_id, phase)?;
            match reference_angles(&references, chamber, &tethers) {
                Ok(angles) => out.push((object_id.clone(), angles)),
                Err(err) => log::warn!("phase {phase}: no angles for '{object_id}': {err}"),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::tube_anchors;
    use approx::assert_relative_eq;

    fn aggregator() -> PhaseAggregator {
        PhaseAggregator::from_config(&AnalysisConfig::default())
    }

    fn midline_rows(phase: f64, n: usize) -> Vec<[f64; 4]> {
        tube_anchors(n, 12.0)
            .into_iter()
            .map(|p| [p.x, p.y, p.z, phase])
            .collect()
    }

    #[test]
    fn test_short_phase_is_skipped_and_reported() {
        let mut rows = midline_rows(0.0, 8);
        rows.extend(midline_rows(1.0, 2));
        rows.extend(midline_rows(2.0, 6));
        let mut collection = PointCollection::new();
        collection.insert("Midline", rows);
        collection.insert("AVCanal", vec![[48.0, 0.0, 12.0, 0.0], [40.0, 0.0, 10.0, 2.0]]);
        collection.insert("tether_Atrium", vec![[20.0, 10.0, 5.0, 0.0], [1.0, 1.0, 1.0, 1.0]]);
        collection.insert("tether_Ventricle", Vec::new());

        let report = aggregator().run(&collection).unwrap();
        assert_eq!(report.statuses.len(), 3);
        assert_eq!(report.fitted_phases(), vec![0, 2]);

        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].0, 1);
        assert!(matches!(skipped[0].1, TethermapError::InsufficientPoints { .. }));

        assert_eq!(report.points_for("tether_Atrium", 0).len(), 1);
        assert!(report.points_for("tether_Atrium", 1).is_empty());
        assert!(report.points_for("tether_Ventricle", 0).is_empty());
        assert!(report.reference_positions.contains_key(&0));
        assert!(report.reference_positions.contains_key(&2));
    }

    #[test]
    fn test_landmarks_only_use_their_own_phase() {
        let mut rows = midline_rows(0.0, 8);
        // phase 1 midline is the same tube shifted far away
        rows.extend(midline_rows(1.0, 8).into_iter().map(|r| [r[0], r[1] + 500.0, r[2], r[3]]));
        let mut collection = PointCollection::new();
        collection.insert("Midline", rows);
        collection.insert("tether_Atrium", vec![[30.0, 6.0, 8.0, 0.0], [30.0, 506.0, 8.0, 1.0]]);

        let report = aggregator().run(&collection).unwrap();
        let p0 = &report.points_for("tether_Atrium", 0)[0];
        let p1 = &report.points_for("tether_Atrium", 1)[0];
        assert_eq!(p0.phase, 0);
        assert_eq!(p1.phase, 1);
        assert!(p0.distance < 10.0);
        assert!(p1.distance < 10.0);
        assert_relative_eq!(p0.arc_length, p1.arc_length, epsilon = 1.0);
    }

    #[test]
    fn test_tether_angles_from_reference_triplet() {
        let mut collection = PointCollection::new();
        collection.insert("Midline", midline_rows(0.0, 8));
        collection.insert(
            "AVCanal",
            vec![
                [0.0, 0.0, 10.0, 0.0],
                [10.0, 0.0, 12.0, 0.0],
                [20.0, 0.0, 14.0, 0.0],
            ],
        );
        collection.insert("tether_Atrium", vec![[0.0, 5.0, 3.0, 0.0]]);
        collection.insert("tether_Ventricle", vec![[20.0, 5.0, 1.0, 0.0]]);

        let report = aggregator().run(&collection).unwrap();
        assert!(!report.reference_positions.contains_key(&0));
        assert_eq!(report.points_for("AVCanal", 0).len(), 3);

        let atrium = &report.tether_angles[&("tether_Atrium".to_string(), 0)];
        assert_relative_eq!(atrium[0].angle_deg, 90.0, epsilon = 1e-9);
        let ventricle = &report.tether_angles[&("tether_Ventricle".to_string(), 0)];
        assert_relative_eq!(ventricle[0].angle_deg, -90.0, epsilon = 1e-9);
        assert!(!report.tether_angles.contains_key(&("AVCanal".to_string(), 0)));
    }

    #[test]
    fn test_degenerate_reference_axis_keeps_phase() {
        let mut collection = PointCollection::new();
        collection.insert("Midline", midline_rows(0.0, 8));
        // atrial end and canal share xy
        collection.insert(
            "AVCanal",
            vec![
                [10.0, 0.0, 2.0, 0.0],
                [10.0, 0.0, 12.0, 0.0],
                [20.0, 0.0, 14.0, 0.0],
            ],
        );
        collection.insert("tether_Atrium", vec![[0.0, 5.0, 3.0, 0.0]]);
        collection.insert("tether_Ventricle", vec![[20.0, 5.0, 1.0, 0.0]]);

        let report = aggregator().run(&collection).unwrap();
        assert_eq!(report.fitted_phases(), vec![0]);
        assert_eq!(report.skipped().count(), 0);
        assert_eq!(report.points_for("tether_Atrium", 0).len(), 1);
        assert_eq!(report.points_for("AVCanal", 0).len(), 3);
        assert!(!report.tether_angles.contains_key(&("tether_Atrium".to_string(), 0)));
        assert!(report.tether_angles.contains_key(&("tether_Ventricle".to_string(), 0)));
    }

    #[test]
    fn test_outlier_threshold_applies_before_fit() {
        let mut rows = midline_rows(0.0, 8);
        rows[4][1] += 200.0;
        let mut collection = PointCollection::new();
        collection.insert("Midline", rows);

        let plain = aggregator().run(&collection).unwrap();
        let fixed = PhaseAggregator {
            outlier_threshold: Some(2.0),
            ..aggregator()
        }
        .run(&collection)
        .unwrap();

        assert!(plain.midlines[&0].curve.length > 200.0);
        assert!(fixed.midlines[&0].curve.length < 100.0);
    }

    #[test]
    fn test_anchor_sigma_smooths_before_fit() {
        let mut collection = PointCollection::new();
        collection.insert("Midline", midline_rows(0.0, 8));
        let smoothed = PhaseAggregator {
            anchor_sigma: Some(1.0),
            ..aggregator()
        };
        let report = smoothed.run(&collection).unwrap();
        assert_eq!(report.fitted_phases(), vec![0]);

        let raw = collection.points_in_phase("Midline", 0).unwrap();
        let prepared = smoothed.prepare_anchors(raw.clone()).unwrap();
        assert_eq!(prepared.len(), raw.len());
        assert!(prepared.iter().zip(&raw).any(|(a, b)| (a - b).norm() > 1e-6));
    }

    #[test]
    fn test_missing_midline_object_fails() {
        let collection = PointCollection::new();
        assert!(aggregator().run(&collection).is_err());
    }

    #[test]
    fn test_empty_midline_gives_empty_report() {
        let mut collection = PointCollection::new();
        collection.insert("Midline", Vec::new());
        let report = aggregator().run(&collection).unwrap();
        assert!(report.statuses.is_empty());
        assert_eq!(report.points().count(), 0);
    }
}
