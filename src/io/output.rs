use anyhow::{Context, Result};
use csv::Writer;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::annotation::AnnotationStore;
use crate::centerline::Midline;
use crate::processing::phases::{AggregateReport, PhaseOutcome};

/// Writes the session as JSON. Coordinates are written with enough digits
/// to read back bit-identical.
pub fn save_session<P: AsRef<Path>>(store: &AnnotationStore, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &store.to_session())
        .with_context(|| format!("failed to write session {:?}", path))?;
    writer.flush()?;
    Ok(())
}

/// One row per projected landmark.
pub fn write_projections_csv<P: AsRef<Path>>(report: &AggregateReport, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wtr =
        Writer::from_path(path).with_context(|| format!("failed to create {:?}", path))?;
    for point in report.points() {
        wtr.serialize(point)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Per-phase outcome, so skipped phases are visible next to the results.
pub fn write_phase_status_csv<P: AsRef<Path>>(report: &AggregateReport, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wtr =
        Writer::from_path(path).with_context(|| format!("failed to create {:?}", path))?;
    wtr.write_record(["phase", "status", "samples", "length", "reason"])?;
    for status in &report.statuses {
        let record = match &status.outcome {
            PhaseOutcome::Fitted { samples, length } => vec![
                status.phase.to_string(),
                "fitted".to_string(),
                samples.to_string(),
                length.to_string(),
                String::new(),
            ],
            PhaseOutcome::Skipped(err) => vec![
                status.phase.to_string(),
                "skipped".to_string(),
                String::new(),
                String::new(),
                err.to_string(),
            ],
        };
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Samples and frame vectors of one midline, for plotting.
pub fn write_midline_csv<P: AsRef<Path>>(midline: &Midline, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wtr =
        Writer::from_path(path).with_context(|| format!("failed to create {:?}", path))?;
    wtr.write_record([
        "phase", "index", "x", "y", "z", "tx", "ty", "tz", "nx", "ny", "nz", "bx", "by", "bz",
    ])?;
    let frame = &midline.frame;
    for (i, p) in midline.curve.points.iter().enumerate() {
        let (t, n, b) = (frame.tangents[i], frame.normals[i], frame.binormals[i]);
        let mut record = vec![midline.phase.to_string(), i.to_string()];
        record.extend(
            [p.x, p.y, p.z, t.x, t.y, t.z, n.x, n.y, n.z, b.x, b.y, b.z]
                .iter()
                .map(|v| v.to_string()),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod output_tests {
    use super::*;
    use crate::annotation::{default_objects, AnnotationStore};
    use crate::io::input::load_session;
    use std::fs;

    #[test]
    fn test_session_round_trip_is_bit_identical() {
        let mut store = AnnotationStore::new(default_objects()).unwrap();
        let awkward = [0.1 + 0.2, 1.0 / 3.0, 7.0, 2.0];
        store.add_point("Midline", awkward).unwrap();
        store.add_point("AVCanal", [123.456789012345, 1e-17, 0.0, 0.0]).unwrap();

        let path = std::env::temp_dir().join("tethermap_session_test.json");
        save_session(&store, &path).unwrap();
        let restored = load_session(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(restored, store);
        let row = restored.points("Midline").unwrap()[0];
        for (a, b) in row.iter().zip(awkward.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
