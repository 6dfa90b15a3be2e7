use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::centerline::{fit_phase, Midline};
use crate::config::AnalysisConfig;
use crate::io::input::{load_session, read_anchor_file};
use crate::io::output::{write_midline_csv, write_phase_status_csv, write_projections_csv};
use crate::annotation::PointCollection;
use crate::processing::phases::{AggregateReport, PhaseAggregator};

/// Loads a saved session, scales it to physical units, projects every
/// landmark onto its phase's midline and writes the projections as CSV.
///
/// A `<stem>_phases.csv` with the per-phase status is written next to
/// `output_csv`.
pub fn run_projection<P: AsRef<Path>, Q: AsRef<Path>>(
    session_path: P,
    config: &AnalysisConfig,
    output_csv: Q,
) -> Result<AggregateReport> {
    let output_csv = output_csv.as_ref();
    let store = load_session(session_path.as_ref())
        .context("run_projection: loading session failed")?;
    let collection = store.collection().to_physical(&config.pixel_size);

    let report = PhaseAggregator::from_config(config)
        .run(&collection)
        .context("run_projection: aggregation failed")?;
    for (phase, err) in report.skipped() {
        log::warn!("phase {} has no midline: {}", phase, err);
    }

    ensure_parent(output_csv)?;
    write_projections_csv(&report, output_csv)
        .context("run_projection: writing projections failed")?;
    write_phase_status_csv(&report, status_path(output_csv))
        .context("run_projection: writing phase status failed")?;

    log::info!(
        "wrote {} projected points to {:?}",
        report.points().count(),
        output_csv
    );
    Ok(report)
}

/// Fits every phase of a plain anchor file and writes one
/// `midline_phase_<n>.csv` per phase into `output_dir`.
///
/// Anchors are in pixels and scaled by the configured pixel size. Optional
/// outlier replacement and Gaussian smoothing run before the fit.
pub fn run_midline_export<P: AsRef<Path>, Q: AsRef<Path>>(
    anchor_path: P,
    config: &AnalysisConfig,
    output_dir: Q,
) -> Result<Vec<Midline>> {
    let output_dir = output_dir.as_ref();
    let rows = read_anchor_file(anchor_path.as_ref())?;
    if rows.is_empty() {
        bail!("no anchors in {:?}", anchor_path.as_ref());
    }

    let mut collection = PointCollection::new();
    collection.insert(&config.midline_id, rows);
    let collection = collection.to_physical(&config.pixel_size);

    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {:?}", output_dir))?;

    let aggregator = PhaseAggregator::from_config(config);
    let mut midlines = Vec::new();
    for phase in collection.phases(&config.midline_id)? {
        let anchors =
            aggregator.prepare_anchors(collection.points_in_phase(&config.midline_id, phase)?)?;

        let midline = fit_phase(phase, &anchors, &config.fit, config.frame_method)
            .with_context(|| format!("phase {} could not be fitted", phase))?;
        write_midline_csv(&midline, output_dir.join(format!("midline_phase_{}.csv", phase)))?;
        midlines.push(midline);
    }
    Ok(midlines)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("failed to create {:?}", parent))?;
    }
    Ok(())
}

fn status_path(output_csv: &Path) -> std::path::PathBuf {
    let stem = output_csv
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "projections".to_string());
    output_csv.with_file_name(format!("{}_phases.csv", stem))
}
