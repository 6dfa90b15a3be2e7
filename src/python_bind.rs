// File: src/python_bind.rs
use std::collections::{BTreeMap, HashMap};

use nalgebra::Point3;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::annotation::PointCollection;
use crate::centerline::{fit_phase, FitParams, FrameMethod, Midline};
use crate::config::AnalysisConfig;
use crate::entry::run_projection;
use crate::error::TethermapError;
use crate::processing::phases::{AggregateReport, PhaseAggregator};
use crate::projection::{ProjectedPoint, Projection};

impl From<TethermapError> for PyErr {
    fn from(err: TethermapError) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

fn to_points(points: &[(f64, f64, f64)]) -> Vec<Point3<f64>> {
    points.iter().map(|&(x, y, z)| Point3::new(x, y, z)).collect()
}

#[pyclass]
#[derive(Debug, Clone)]
pub struct PyMidline {
    inner: Midline,
}

#[pymethods]
impl PyMidline {
    #[getter]
    fn phase(&self) -> i64 {
        self.inner.phase
    }

    #[getter]
    fn length(&self) -> f64 {
        self.inner.curve.length
    }

    fn points(&self) -> Vec<(f64, f64, f64)> {
        self.inner.curve.points.iter().map(|p| (p.x, p.y, p.z)).collect()
    }

    fn tangents(&self) -> Vec<(f64, f64, f64)> {
        self.inner.frame.tangents.iter().map(|v| (v.x, v.y, v.z)).collect()
    }

    fn normals(&self) -> Vec<(f64, f64, f64)> {
        self.inner.frame.normals.iter().map(|v| (v.x, v.y, v.z)).collect()
    }

    fn binormals(&self) -> Vec<(f64, f64, f64)> {
        self.inner.frame.binormals.iter().map(|v| (v.x, v.y, v.z)).collect()
    }

    fn __len__(&self) -> usize {
        self.inner.curve.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "Midline(phase={}, samples={}, length={:.2})",
            self.inner.phase,
            self.inner.curve.len(),
            self.inner.curve.length
        )
    }
}

#[pyclass]
#[derive(Debug, Clone)]
pub struct PyProjection {
    #[pyo3(get)]
    pub arc_length: f64,
    #[pyo3(get)]
    pub position: f64,
    #[pyo3(get)]
    pub angle_deg: f64,
    #[pyo3(get)]
    pub distance: f64,
    #[pyo3(get)]
    pub ambiguous: bool,
}

#[pymethods]
impl PyProjection {
    fn __repr__(&self) -> String {
        format!(
            "Projection(arc_length={:.1}, angle={:.2}, distance={:.2}, ambiguous={})",
            self.arc_length, self.angle_deg, self.distance, self.ambiguous
        )
    }
}

impl From<Projection> for PyProjection {
    fn from(p: Projection) -> Self {
        Self {
            arc_length: p.arc_length,
            position: p.position,
            angle_deg: p.angle_deg,
            distance: p.distance,
            ambiguous: p.ambiguous,
        }
    }
}

#[pyclass]
#[derive(Debug, Clone)]
pub struct PyProjectedPoint {
    #[pyo3(get)]
    pub object_id: String,
    #[pyo3(get)]
    pub phase: i64,
    #[pyo3(get)]
    pub arc_length: f64,
    #[pyo3(get)]
    pub position: f64,
    #[pyo3(get)]
    pub angle_deg: f64,
    #[pyo3(get)]
    pub distance: f64,
    #[pyo3(get)]
    pub ambiguous: bool,
}

#[pymethods]
impl PyProjectedPoint {
    fn __repr__(&self) -> String {
        format!(
            "ProjectedPoint(id={}, phase={}, arc_length={:.1}, angle={:.2})",
            self.object_id, self.phase, self.arc_length, self.angle_deg
        )
    }
}

impl From<&ProjectedPoint> for PyProjectedPoint {
    fn from(p: &ProjectedPoint) -> Self {
        Self {
            object_id: p.object_id.clone(),
            phase: p.phase,
            arc_length: p.arc_length,
            position: p.position,
            angle_deg: p.angle_deg,
            distance: p.distance,
            ambiguous: p.ambiguous,
        }
    }
}

/// Result of `aggregate`: projected points plus the phases that were skipped
/// and why.
#[pyclass]
#[derive(Debug, Clone)]
pub struct PyAggregate {
    #[pyo3(get)]
    pub points: Vec<PyProjectedPoint>,
    #[pyo3(get)]
    pub skipped: Vec<(i64, String)>,
    #[pyo3(get)]
    pub reference_positions: Vec<(i64, f64)>,
}

impl From<&AggregateReport> for PyAggregate {
    fn from(report: &AggregateReport) -> Self {
        Self {
            points: report.points().map(PyProjectedPoint::from).collect(),
            skipped: report
                .skipped()
                .map(|(phase, err)| (phase, err.to_string()))
                .collect(),
            reference_positions: report
                .reference_positions
                .iter()
                .map(|(&phase, &pos)| (phase, pos))
                .collect(),
        }
    }
}

fn parse_method(method: &str) -> PyResult<FrameMethod> {
    method.parse::<FrameMethod>().map_err(PyErr::from)
}

/// Fits and frames one phase of midline anchors given in physical units.
#[pyfunction]
#[pyo3(signature = (anchors, phase = 0, smoothing = 100.0, degree = 3, method = "pt"))]
pub fn fit_phase_py(
    anchors: Vec<(f64, f64, f64)>,
    phase: i64,
    smoothing: f64,
    degree: usize,
    method: &str,
) -> PyResult<PyMidline> {
    let params = FitParams {
        smoothing,
        degree,
        ..FitParams::default()
    };
    params.validate()?;
    let midline = fit_phase(phase, &to_points(&anchors), &params, parse_method(method)?)?;
    Ok(PyMidline { inner: midline })
}

#[pyfunction]
pub fn project_py(point: (f64, f64, f64), midline: &PyMidline) -> PyResult<PyProjection> {
    let (x, y, z) = point;
    Ok(midline.inner.project(&Point3::new(x, y, z))?.into())
}

/// Runs the per-phase pipeline over `{object_id: [[x, y, z, phase], ...]}`.
///
/// Rows are taken as already in physical units. `config` is optional TOML
/// text with the same keys as the config file.
#[pyfunction]
#[pyo3(signature = (rows, config = None))]
pub fn aggregate_py(
    rows: HashMap<String, Vec<[f64; 4]>>,
    config: Option<&str>,
) -> PyResult<PyAggregate> {
    let config = match config {
        Some(text) => AnalysisConfig::from_toml_str(text)
            .map_err(|e| PyValueError::new_err(format!("{:#}", e)))?,
        None => AnalysisConfig::default(),
    };
    let collection = PointCollection::from_map(rows.into_iter().collect::<BTreeMap<_, _>>())?;
    let report = PhaseAggregator::from_config(&config).run(&collection)?;
    Ok((&report).into())
}

#[pyfunction]
#[pyo3(signature = (session_path, output_csv, config_path = None))]
pub fn run_projection_py(
    session_path: &str,
    output_csv: &str,
    config_path: Option<&str>,
) -> PyResult<PyAggregate> {
    let config = match config_path {
        Some(path) => AnalysisConfig::load(path),
        None => Ok(AnalysisConfig::default()),
    }
    .map_err(|e| PyValueError::new_err(format!("{:#}", e)))?;
    let report = run_projection(session_path, &config, output_csv)
        .map_err(|e| PyRuntimeError::new_err(format!("{:#}", e)))?;
    Ok((&report).into())
}
