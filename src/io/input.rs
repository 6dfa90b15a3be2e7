use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::annotation::{AnnotationSession, AnnotationStore, PointRow};

/// Field separator of an anchor export, judged from the first line that
/// carries a number. Tabs, semicolons and commas are tried in that order;
/// anything else is read as whitespace-separated columns.
fn sniff_anchor_delimiter(path: &Path) -> Result<u8> {
    let file =
        File::open(path).with_context(|| format!("failed to open anchor file {:?}", path))?;
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("failed to read anchor file {:?}", path))?;
        if !line.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }
        let delim = [b'\t', b';', b',']
            .into_iter()
            .find(|d| line.as_bytes().contains(d))
            .unwrap_or(b' ');
        return Ok(delim);
    }
    Ok(b',')
}

/// Reads a plain anchor file with one `x, y, z[, phase]` row per line.
///
/// Rows that do not parse (headers, comments, blank lines) are skipped.
/// Rows without a phase column are assigned phase 0.
pub fn read_anchor_file<P: AsRef<Path>>(path: P) -> Result<Vec<PointRow>> {
    let path = path.as_ref();
    let delim = sniff_anchor_delimiter(path)?;
    let file =
        File::open(path).with_context(|| format!("failed to open anchor file {:?}", path))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delim)
        .from_reader(file);

    let mut rows = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                log::debug!("skipping unreadable row {}: {}", line + 1, e);
                continue;
            }
        };
        // runs of spaces leave empty fields between columns
        let values: Option<Vec<f64>> = record
            .iter()
            .filter(|v| delim != b' ' || !v.is_empty())
            .map(|v| v.parse::<f64>().ok())
            .collect();
        match values.as_deref() {
            Some([x, y, z]) => rows.push([*x, *y, *z, 0.0]),
            Some([x, y, z, phase]) => rows.push([*x, *y, *z, *phase]),
            _ => log::debug!("skipping row {}: {:?}", line + 1, record),
        }
    }

    if rows.iter().any(|r| r.iter().any(|v| !v.is_finite())) {
        return Err(anyhow!("anchor file {:?} contains non-finite values", path));
    }
    log::info!("read {} anchors from {:?}", rows.len(), path);
    Ok(rows)
}

/// Loads an annotation session saved by [`crate::io::output::save_session`].
pub fn load_session<P: AsRef<Path>>(path: P) -> Result<AnnotationStore> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("failed to open session {:?}", path))?;
    let session: AnnotationSession = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse session {:?}", path))?;
    let store = AnnotationStore::from_session(session)
        .with_context(|| format!("invalid session {:?}", path))?;
    log::info!(
        "loaded session {:?} with {} objects",
        path,
        store.objects().len()
    );
    Ok(store)
}
