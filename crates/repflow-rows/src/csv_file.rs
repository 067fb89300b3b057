//! CSV sources. The header row names the fields; values are typed with
//! `Scalar::infer`.

use std::path::Path;

use repflow_core::error::{Error, Result};
use repflow_core::object::ObjectRef;
use repflow_core::types::Scalar;

use crate::object::{Record, RowListObject, RowStreamObject};

/// Open `path` as a single-pass row stream.
///
/// The file is checked record by record before the stream is handed out, so
/// a missing or malformed file fails here rather than truncating the data a
/// downstream operation sees. Records are only parsed into rows when read.
pub fn csv_source(path: impl AsRef<Path>) -> Result<ObjectRef> {
    let path = path.as_ref();
    let records = check_records(path)?;

    let mut reader = csv::Reader::from_path(path).map_err(|e| io_like(path, e))?;
    let headers = headers_of(&mut reader, path)?;
    let shown = path.display().to_string();
    let mut read = 0usize;
    let rows = reader.into_records().map_while(move |rec| match rec {
        Ok(rec) => {
            read += 1;
            Some(to_record(&headers, &rec))
        }
        Err(e) => {
            // Only reachable if the file changed after the check.
            tracing::error!(path = %shown, read, expected = records, error = %e, "csv stream ended early");
            None
        }
    });
    Ok(RowStreamObject::shared(rows))
}

/// Read `path` fully into a retained row list.
pub fn csv_list(path: impl AsRef<Path>) -> Result<ObjectRef> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path).map_err(|e| io_like(path, e))?;
    let headers = headers_of(&mut reader, path)?;
    let mut rows = Vec::new();
    for rec in reader.records() {
        let rec = rec.map_err(|e| io_like(path, e))?;
        rows.push(to_record(&headers, &rec));
    }
    Ok(RowListObject::shared(rows))
}

/// Walk every record once without keeping it. Returns the record count.
fn check_records(path: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| io_like(path, e))?;
    headers_of(&mut reader, path)?;
    let mut record = csv::StringRecord::new();
    let mut count = 0;
    while reader.read_record(&mut record).map_err(|e| io_like(path, e))? {
        count += 1;
    }
    Ok(count)
}

fn headers_of(reader: &mut csv::Reader<std::fs::File>, path: &Path) -> Result<Vec<String>> {
    Ok(reader
        .headers()
        .map_err(|e| io_like(path, e))?
        .iter()
        .map(str::to_string)
        .collect())
}

fn to_record(headers: &[String], rec: &csv::StringRecord) -> Record {
    headers
        .iter()
        .zip(rec.iter())
        .map(|(h, v)| (h.clone(), Scalar::infer(v)))
        .collect()
}

fn io_like(path: &Path, e: csv::Error) -> Error {
    Error::IoLike(format!("csv source {}: {e}", path.display()))
}
