//! Document I/O collaborator.
//!
//! Workbooks are stored natively as JSON documents (cells plus presentation).
//! Spreadsheet files (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) can be read
//! through calamine but are never written.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};

use super::{CellValue, Sheet, Workbook};
use crate::error::{AuditError, Result};
use crate::util::write_json;

/// Read, write and decode tabular documents.
pub trait DocumentStore {
    fn open(&self, path: &Path) -> Result<Workbook>;
    fn save(&self, workbook: &Workbook, path: &Path) -> Result<()>;
    /// Decode an in-memory document (e.g. a mail attachment) by its file name.
    fn decode(&self, name: &str, bytes: &[u8]) -> Result<Workbook>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Spreadsheet,
}

impl DocumentFormat {
    /// Format for a file name, by extension (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())?;
        match ext.as_str() {
            "json" => Some(DocumentFormat::Json),
            e if e.starts_with("xls") || e == "ods" => Some(DocumentFormat::Spreadsheet),
            _ => None,
        }
    }
}

/// Filesystem-backed document store.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStore;

impl DocumentStore for FileStore {
    fn open(&self, path: &Path) -> Result<Workbook> {
        if !path.exists() {
            return Err(AuditError::InvalidSourcePath(path.to_path_buf()));
        }
        let name = path.to_string_lossy();
        match DocumentFormat::from_name(&name) {
            Some(DocumentFormat::Json) => {
                let content = std::fs::read_to_string(path)?;
                Ok(serde_json::from_str(&content)?)
            }
            Some(DocumentFormat::Spreadsheet) => {
                let mut reader = open_workbook_auto(path)
                    .map_err(|e| AuditError::Spreadsheet(format!("{}: {}", path.display(), e)))?;
                read_sheets(&mut reader)
            }
            None => Err(AuditError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    fn save(&self, workbook: &Workbook, path: &Path) -> Result<()> {
        match DocumentFormat::from_name(&path.to_string_lossy()) {
            Some(DocumentFormat::Json) => write_json(path, workbook),
            _ => Err(AuditError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    fn decode(&self, name: &str, bytes: &[u8]) -> Result<Workbook> {
        match DocumentFormat::from_name(name) {
            Some(DocumentFormat::Json) => Ok(serde_json::from_slice(bytes)?),
            Some(DocumentFormat::Spreadsheet) => {
                let mut reader = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
                    .map_err(|e| AuditError::Spreadsheet(format!("{}: {}", name, e)))?;
                read_sheets(&mut reader)
            }
            None => Err(AuditError::UnsupportedFormat(name.into())),
        }
    }
}

fn read_sheets<R, RS>(reader: &mut R) -> Result<Workbook>
where
    R: Reader<RS>,
    R::Error: std::fmt::Display,
    RS: std::io::Read + std::io::Seek,
{
    let mut workbook = Workbook::new();
    for name in reader.sheet_names().to_vec() {
        let range = reader
            .worksheet_range(&name)
            .map_err(|e| AuditError::Spreadsheet(format!("sheet '{}': {}", name, e)))?;
        workbook.sheets.push(Sheet::with_rows(name, range_rows(&range)));
    }
    Ok(workbook)
}

/// Cells of a calamine range, re-anchored at A1.
fn range_rows(range: &Range<Data>) -> Vec<Vec<CellValue>> {
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));
    let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; col_offset];
        cells.extend(row.iter().map(convert_cell));
        rows.push(cells);
    }
    rows
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::Text(format!("#ERR({:?})", e)),
        Data::DateTime(dt) => serial_to_datetime(dt.as_f64())
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) => crate::util::parse_timestamp(s)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Spreadsheet serial date (days since 1899-12-30) to a date-time.
pub(crate) fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    base.checked_add_signed(Duration::milliseconds(millis))
}
