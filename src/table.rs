//! Tabular source reading.
//!
//! Sources are read once into memory as rows of JSON values. Cells are made
//! safe for JSON transport on the way in: empty cells become null, integral
//! floats become integers, non-finite floats become null.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::Row;

/// A spreadsheet loaded into memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Read a CSV file or a workbook (xlsx, xlsm, xls, xlsb, ods).
    ///
    /// The first row holds the column names. For workbooks only the first
    /// sheet is read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceError`] if the file cannot be opened, decoded,
    /// or has an unsupported extension.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let table = match extension.as_str() {
            "csv" | "txt" => read_csv(path)?,
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook(path)?,
            other => {
                return Err(Error::source_error(format!(
                    "Unsupported file type '{other}': {}",
                    path.display()
                )));
            }
        };

        tracing::debug!(
            path = %path.display(),
            columns = table.columns.len(),
            rows = table.rows.len(),
            "source loaded"
        );
        Ok(table)
    }

    /// Build a table from a header row and value rows.
    ///
    /// Blank headers become `Unnamed: {index}`, repeated headers get a `.N`
    /// suffix, short rows are padded with null, and rows whose cells are all
    /// null are skipped.
    pub fn from_records<H, S>(headers: H, records: impl IntoIterator<Item = Vec<Value>>) -> Self
    where
        H: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = unique_headers(headers.into_iter().map(Into::into).collect());

        let rows = records
            .into_iter()
            .filter(|record| record.iter().any(|v| !v.is_null()))
            .map(|record| {
                let mut values = record.into_iter();
                columns
                    .iter()
                    .map(|column| (column.clone(), values.next().unwrap_or(Value::Null)))
                    .collect::<Row>()
            })
            .collect();

        Self { columns, rows }
    }

    /// Column names in source order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> &[Row] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Fail on the first column that does not exist.
    pub fn require_columns(&self, columns: &[String]) -> Result<()> {
        match columns.iter().find(|c| !self.has_column(c)) {
            Some(missing) => Err(Error::unknown_column(missing.clone())),
            None => Ok(()),
        }
    }

    /// Text of every non-empty cell of a column, in row order.
    pub fn column_text<'a>(&'a self, column: &'a str) -> impl Iterator<Item = String> + 'a {
        self.rows
            .iter()
            .filter_map(move |row| row.get(column).and_then(cell_text))
    }
}

/// Text of a cell for address assembly, trimmed; `None` when empty.
pub fn cell_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// JSON value for a float cell.
///
/// Non-finite values become null; integral values become integers so that
/// postcodes stored as numbers read back as `75001`, not `75001.0`.
pub fn float_value(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(index, header)| {
            let header = header.trim_start_matches('\u{feff}').to_string();
            let base = if header.trim().is_empty() {
                format!("Unnamed: {index}")
            } else {
                header
            };

            let mut name = base.clone();
            let mut suffix = 1;
            while !seen.insert(name.clone()) {
                name = format!("{base}.{suffix}");
                suffix += 1;
            }
            name
        })
        .collect()
}

fn read_csv(path: &Path) -> Result<Table> {
    let mut first_line = String::new();
    std::fs::File::open(path)
        .map(std::io::BufReader::new)
        .and_then(|mut reader| reader.read_line(&mut first_line))
        .map_err(|e| Error::source_error(format!("Failed to read {}: {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(&first_line))
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::source_error(format!("Failed to open {}: {e}", path.display())))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::source_error(format!("Failed to read header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::source_error(format!("Malformed CSV: {e}")))?;
        records.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Value::Null
                    } else {
                        Value::String(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(Table::from_records(headers, records))
}

/// French exports commonly use `;`; fall back to `,`.
fn sniff_delimiter(first_line: &str) -> u8 {
    let semicolons = first_line.matches(';').count();
    let commas = first_line.matches(',').count();
    if semicolons > commas { b';' } else { b',' }
}

/// JSON value for a workbook cell.
///
/// Error cells become null; dates become their serial number.
#[cfg(feature = "excel")]
fn cell_value(cell: &calamine::Data) -> Value {
    use calamine::Data;

    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Float(n) => float_value(*n),
        Data::Int(n) => Value::from(*n),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => float_value(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
    }
}

#[cfg(feature = "excel")]
fn read_workbook(path: &Path) -> Result<Table> {
    use calamine::{Data, Reader, open_workbook_auto};

    fn header_text(cell: &Data) -> String {
        match cell_value(cell) {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::source_error(format!("Failed to open workbook: {e}")))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::source_error("Workbook contains no sheets"))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| Error::source_error(format!("Failed to read sheet '{sheet_name}': {e}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(header_text).collect())
        .unwrap_or_default();
    let records = rows.map(|row| row.iter().map(cell_value).collect::<Vec<_>>());

    Ok(Table::from_records(headers, records))
}

#[cfg(not(feature = "excel"))]
fn read_workbook(path: &Path) -> Result<Table> {
    Err(Error::source_error(format!(
        "Workbook support disabled (enable the `excel` feature): {}",
        path.display()
    )))
}
