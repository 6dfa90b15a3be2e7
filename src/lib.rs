//! Landmark annotation and midline-relative coordinates for light-sheet
//! stacks of the embryonic zebrafish heart tube.
//!
//! Points are annotated per z-plane and contraction phase into an
//! [`AnnotationStore`]. For each phase the `Midline` anchors are fitted
//! with a smoothing spline, resampled at unit arc length and framed by
//! parallel transport; tethers and the AVCanal are then expressed as
//! arc length along the midline and angle around it.

pub mod annotation;
pub mod centerline;
pub mod config;
pub mod entry;
pub mod error;
pub mod io;
pub mod processing;
pub mod projection;
mod utils;

#[cfg(feature = "python")]
mod python_bind;

pub use annotation::{AnnotationStore, ObjectDescriptor, PixelSize, PointCollection};
pub use centerline::{fit_phase, FitParams, FrameMethod, Midline};
pub use config::AnalysisConfig;
pub use entry::{run_midline_export, run_projection};
pub use error::TethermapError;
pub use processing::phases::{AggregateReport, PhaseAggregator};
pub use projection::{project, ProjectedPoint, Projection};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// This is the module importable from Python:
///
/// ```python
/// import tethermap as tm
/// midline = tm.fit_phase_py([(0, 0, 0), (10, 0, 0), (20, 2, 0), (30, 5, 1)])
/// tm.project_py((12.0, 3.0, 0.0), midline)
/// ```
#[cfg(feature = "python")]
#[pymodule]
fn tethermap(m: &Bound<'_, PyModule>) -> PyResult<()> {
    use python_bind::*;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_function(wrap_pyfunction!(fit_phase_py, m)?)?;
    m.add_function(wrap_pyfunction!(project_py, m)?)?;
    m.add_function(wrap_pyfunction!(aggregate_py, m)?)?;
    m.add_function(wrap_pyfunction!(run_projection_py, m)?)?;

    m.add_class::<PyMidline>()?;
    m.add_class::<PyProjection>()?;
    m.add_class::<PyProjectedPoint>()?;
    m.add_class::<PyAggregate>()?;
    Ok(())
}
