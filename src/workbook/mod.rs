//! In-memory tabular documents.
//!
//! A `Workbook` is an ordered list of named `Sheet`s; a sheet is a ragged grid
//! of `CellValue`s (row 0 is the header) plus the presentation directives the
//! styling collaborator attached to it. Indices are zero-based throughout;
//! `CellRange::to_a1` renders spreadsheet-style addresses for display.

pub mod store;
pub mod style;

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use style::Presentation;

/// A single cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

static EMPTY: CellValue = CellValue::Empty;

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// Empty cells and empty text count as blank.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric view: numbers, booleans as 0/1, and numeric text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Boolean view: booleans, TRUE/FALSE text (any case) and 1/0.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            CellValue::Number(n) if *n == 1.0 => Some(true),
            CellValue::Number(n) if *n == 0.0 => Some(false),
            CellValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Date-time view: date-time cells and timestamp text.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::DateTime(dt) => Some(*dt),
            CellValue::Text(s) => crate::util::parse_timestamp(s),
            _ => None,
        }
    }

    /// Text cell for `Some`, empty cell for `None`.
    pub fn from_opt_text(value: Option<&str>) -> Self {
        match value {
            Some(s) => CellValue::Text(s.to_string()),
            None => CellValue::Empty,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            CellValue::Bool(true) => f.write_str("TRUE"),
            CellValue::Bool(false) => f.write_str("FALSE"),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<usize> for CellValue {
    fn from(value: usize) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Empty)
    }
}

/// Spreadsheet column letter for a zero-based column index (0 → "A", 27 → "AB").
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Inclusive rectangular range of cells, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRange {
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl CellRange {
    /// Range from a top-left corner and an extent (rows, columns added).
    pub fn from_extent(top_left: (usize, usize), extent: (usize, usize)) -> Self {
        Self {
            first_row: top_left.0,
            first_col: top_left.1,
            last_row: top_left.0 + extent.0,
            last_col: top_left.1 + extent.1,
        }
    }

    pub fn cell(row: usize, col: usize) -> Self {
        Self::from_extent((row, col), (0, 0))
    }

    /// Data body of one column: rows 1..=last_row.
    pub fn column_body(col: usize, last_row: usize) -> Self {
        Self {
            first_row: 1,
            first_col: col,
            last_row: last_row.max(1),
            last_col: col,
        }
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }

    /// "A2:C10" style address.
    pub fn to_a1(&self) -> String {
        format!(
            "{}{}:{}{}",
            column_letter(self.first_col),
            self.first_row + 1,
            column_letter(self.last_col),
            self.last_row + 1
        )
    }
}

/// A named grid of cells with its presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Vec<CellValue>>,
    #[serde(default)]
    pub presentation: Presentation,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            presentation: Presentation::default(),
        }
    }

    pub fn with_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            rows,
            ..Self::new(name)
        }
    }

    /// Number of rows, header included.
    pub fn max_row(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn max_column(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        self.rows.get(row).and_then(|r| r.get(col)).unwrap_or(&EMPTY)
    }

    /// Set a cell, growing the grid as needed.
    pub fn set(&mut self, row: usize, col: usize, value: impl Into<CellValue>) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize_with(col + 1, CellValue::default);
        }
        cells[col] = value.into();
    }

    /// Header labels (row 0) as text; blank headers become empty strings.
    pub fn header(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|r| r.iter().map(|c| c.to_string().trim().to_string()).collect())
            .unwrap_or_default()
    }

    /// Position of the first header cell exactly equal to `label`.
    pub fn find_column(&self, label: &str) -> Option<usize> {
        self.header().iter().position(|h| h == label)
    }

    /// Positions of every header cell equal to `label`, ignoring case.
    pub fn find_columns_ci(&self, label: &str) -> Vec<usize> {
        let wanted = label.trim().to_lowercase();
        self.header()
            .iter()
            .enumerate()
            .filter(|(_, h)| h.to_lowercase() == wanted)
            .map(|(i, _)| i)
            .collect()
    }

    /// Data rows (everything below the header).
    pub fn data_rows(&self) -> &[Vec<CellValue>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    fn row_is_empty(&self, row: usize) -> bool {
        self.rows[row].iter().all(CellValue::is_empty)
    }

    fn column_is_empty(&self, col: usize) -> bool {
        self.rows.iter().all(|r| r.get(col).map_or(true, CellValue::is_empty))
    }

    /// Drop trailing rows and columns whose every cell is empty.
    ///
    /// Returns the remaining (rows, columns).
    pub fn trim_trailing_empty(&mut self) -> (usize, usize) {
        while !self.rows.is_empty() && self.row_is_empty(self.rows.len() - 1) {
            self.rows.pop();
        }
        let mut width = self.max_column();
        while width > 0 && self.column_is_empty(width - 1) {
            width -= 1;
        }
        for row in &mut self.rows {
            row.truncate(width);
        }
        (self.max_row(), width)
    }

    /// Pad every row to the same width so column-wise operations line up.
    pub fn square_up(&mut self) {
        let width = self.max_column();
        for row in &mut self.rows {
            row.resize_with(width, CellValue::default);
        }
    }
}

/// An ordered collection of sheets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    #[serde(default)]
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Add a sheet, replacing any existing sheet with the same name in place.
    pub fn put_sheet(&mut self, sheet: Sheet) {
        match self.sheets.iter().position(|s| s.name == sheet.name) {
            Some(i) => self.sheets[i] = sheet,
            None => self.sheets.push(sheet),
        }
    }
}
