//! Export of persisted job results as a labelled CSV download.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::jobs::JobStore;
use crate::types::Row;

/// The only supported export format.
pub const CSV_FORMAT: &str = "csv";

/// Media type of CSV exports.
pub const CSV_MEDIA_TYPE: &str = "text/csv";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Display labels for known result fields; other fields keep their name.
pub const FIELD_LABELS: [(&str, &str); 6] = [
    ("valid", "Adresse valide"),
    ("reason", "Raison"),
    ("postal_code", "Code postal"),
    ("city", "Ville"),
    ("country", "Pays"),
    ("confidence", "Confiance"),
];

/// A file ready to be served.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Export {
    /// Location of the generated file
    pub path: PathBuf,
    /// Suggested download name
    pub filename: String,
    /// Media type of the file
    pub media_type: String,
}

/// Header label for a result field.
pub fn field_label(field: &str) -> &str {
    FIELD_LABELS
        .iter()
        .find(|(name, _)| *name == field)
        .map_or(field, |(_, label)| label)
}

/// CSV text of a result value.
///
/// Null becomes an empty cell, booleans are written `True`/`False`, nested
/// values as JSON.
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Bool(true)) => "True".to_string(),
        Some(Value::Bool(false)) => "False".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Convert a job's result file into a new CSV file.
///
/// The file starts with a UTF-8 byte-order mark. Columns follow the keys of
/// the first record; later records are projected onto them. Exporting the
/// same job twice produces identical bytes.
///
/// # Errors
///
/// - [`Error::InvalidRequest`] for any format other than `csv`
/// - [`Error::JobNotFound`] if the job has no result file
/// - [`Error::JobFileError`] if a line is not a JSON object
pub fn export(store: &JobStore, job_id: &str, format: &str) -> Result<Export> {
    if !format.eq_ignore_ascii_case(CSV_FORMAT) {
        return Err(Error::invalid_request(format!("Unsupported format: {format}")));
    }

    let reader = store.open_reader(job_id)?;

    let mut file = tempfile::Builder::new()
        .prefix("verified_addresses_")
        .suffix(".csv")
        .tempfile()?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    let mut fields: Vec<String> = Vec::new();
    let mut rows = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_start_matches('\u{feff}').trim();
        if line.is_empty() {
            continue;
        }

        let record: Row = serde_json::from_str(line).map_err(|e| {
            Error::job_file_error(job_id, format!("Line {}: {e}", index + 1))
        })?;

        if rows == 0 {
            fields = record.keys().cloned().collect();
            writer.write_record(fields.iter().map(|f| field_label(f)))?;
        }
        writer.write_record(fields.iter().map(|f| cell(record.get(f))))?;
        rows += 1;
    }

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    let (_, path) = file.keep().map_err(|e| e.error)?;

    tracing::info!(%job_id, rows, path = %path.display(), "job exported");

    Ok(Export {
        path,
        filename: format!("verified_addresses_{job_id}.csv"),
        media_type: CSV_MEDIA_TYPE.to_string(),
    })
}
