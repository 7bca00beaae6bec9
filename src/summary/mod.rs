//! Append-only summary log of ingested datasets.
//!
//! One row per ingested message. Ingestion appends rows; distribution only
//! stamps the `Send*` fields; reviewers flip `complete` by hand. The log
//! also yields the ingestion watermark.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{AuditError, Result};
use crate::params::validation::ValidationRule;
use crate::report::format;
use crate::workbook::store::DocumentStore;
use crate::workbook::style::{Condition, ConditionalRule, SheetStyler, Styler};
use crate::workbook::{CellRange, CellValue, Sheet, Workbook};

/// Log columns, in sheet order.
pub const LOG_COLUMNS: [&str; 29] = [
    "period",
    "pattern",
    "sender",
    "to",
    "cc",
    "Subject",
    "Body",
    "ReceivedTime",
    "CreationTime",
    "SentOn",
    "workbook",
    "saveas",
    "NoAttachment",
    "Attachments",
    "sheets",
    "n_sheets",
    "hasdata",
    "n_rows",
    "n_cols",
    "range",
    "n_points",
    "p_point",
    "p_match",
    "username",
    "computer",
    "complete",
    "SendTime",
    "SendUser",
    "SendComputer",
];

/// Completeness metrics of a saved dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityFields {
    pub sheets: Option<String>,
    pub n_sheets: Option<usize>,
    pub hasdata: Option<bool>,
    pub n_rows: Option<usize>,
    pub n_cols: Option<usize>,
    pub range: Option<String>,
    pub n_points: Option<usize>,
    pub p_point: Option<f64>,
    pub p_match: Option<f64>,
}

/// One log row.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEntry {
    pub period: Option<String>,
    pub pattern: Option<String>,
    pub sender: String,
    pub to: String,
    pub cc: String,
    pub subject: String,
    pub body: String,
    pub received_time: NaiveDateTime,
    pub creation_time: Option<NaiveDateTime>,
    pub sent_on: Option<NaiveDateTime>,
    pub workbook: String,
    pub saveas: String,
    pub no_attachment: usize,
    pub attachments: String,
    pub quality: QualityFields,
    pub username: Option<String>,
    pub computer: Option<String>,
    /// Set by reviewers; `None` when the cell is blank or unreadable.
    pub complete: Option<bool>,
    pub send_time: Option<NaiveDateTime>,
    pub send_user: Option<String>,
    pub send_computer: Option<String>,
}

impl SummaryEntry {
    /// Entries ready to go out: marked complete and never sent.
    pub fn is_eligible(&self) -> bool {
        self.complete == Some(true) && self.send_time.is_none()
    }

    /// Path of the saved artifact.
    pub fn artifact_path(&self) -> PathBuf {
        Path::new(&self.saveas).join(&self.workbook)
    }

    /// Stamp a successful distribution. An entry is stamped at most once.
    pub fn mark_sent(&mut self, at: NaiveDateTime, user: &str, computer: &str) -> bool {
        if self.send_time.is_some() {
            return false;
        }
        self.send_time = Some(at);
        self.send_user = Some(user.to_string());
        self.send_computer = Some(computer.to_string());
        true
    }

    pub fn to_row(&self) -> Vec<CellValue> {
        let q = &self.quality;
        vec![
            CellValue::from_opt_text(self.period.as_deref()),
            CellValue::from_opt_text(self.pattern.as_deref()),
            self.sender.as_str().into(),
            self.to.as_str().into(),
            self.cc.as_str().into(),
            self.subject.as_str().into(),
            self.body.as_str().into(),
            self.received_time.into(),
            self.creation_time.into(),
            self.sent_on.into(),
            self.workbook.as_str().into(),
            self.saveas.as_str().into(),
            self.no_attachment.into(),
            self.attachments.as_str().into(),
            q.sheets.clone().into(),
            q.n_sheets.into(),
            q.hasdata.into(),
            q.n_rows.into(),
            q.n_cols.into(),
            q.range.clone().into(),
            q.n_points.into(),
            q.p_point.into(),
            q.p_match.into(),
            self.username.clone().into(),
            self.computer.clone().into(),
            self.complete.into(),
            self.send_time.into(),
            self.send_user.clone().into(),
            self.send_computer.clone().into(),
        ]
    }

    /// Read an entry from a log row; `columns` maps labels to positions.
    pub fn from_row(
        columns: &HashMap<String, usize>,
        row: &[CellValue],
        line: usize,
    ) -> Result<Self> {
        let r = RowReader { columns, row };
        let text = |label: &str| r.text(label);
        let plain = |label: &str| r.text(label).unwrap_or_default();
        let time = |label: &str| r.cell(label).as_datetime();
        let count = |label: &str| r.cell(label).as_f64().map(|n| n.max(0.0) as usize);

        let received_time = time("ReceivedTime").ok_or_else(|| {
            AuditError::invalid_value(
                "ReceivedTime",
                format!("log row {} has no readable received time", line + 1),
            )
        })?;

        let complete_cell = r.cell("complete");
        let complete = complete_cell.as_bool();
        if complete.is_none() && !complete_cell.is_empty() {
            log::warn!(
                "Log row {}: complete value '{}' is not TRUE/FALSE",
                line + 1,
                complete_cell
            );
        }

        Ok(Self {
            period: text("period"),
            pattern: text("pattern"),
            sender: plain("sender"),
            to: plain("to"),
            cc: plain("cc"),
            subject: plain("Subject"),
            body: plain("Body"),
            received_time,
            creation_time: time("CreationTime"),
            sent_on: time("SentOn"),
            workbook: plain("workbook"),
            saveas: plain("saveas"),
            no_attachment: count("NoAttachment").unwrap_or(0),
            attachments: plain("Attachments"),
            quality: QualityFields {
                sheets: text("sheets"),
                n_sheets: count("n_sheets"),
                hasdata: r.cell("hasdata").as_bool(),
                n_rows: count("n_rows"),
                n_cols: count("n_cols"),
                range: text("range"),
                n_points: count("n_points"),
                p_point: r.cell("p_point").as_f64(),
                p_match: r.cell("p_match").as_f64(),
            },
            username: text("username"),
            computer: text("computer"),
            complete,
            send_time: time("SendTime"),
            send_user: text("SendUser"),
            send_computer: text("SendComputer"),
        })
    }
}

/// Label-addressed view of one log row.
struct RowReader<'a> {
    columns: &'a HashMap<String, usize>,
    row: &'a [CellValue],
}

impl<'a> RowReader<'a> {
    fn cell(&self, label: &str) -> &'a CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.columns
            .get(label)
            .and_then(|c| self.row.get(*c))
            .unwrap_or(&EMPTY)
    }

    fn text(&self, label: &str) -> Option<String> {
        let v = self.cell(label);
        (!v.is_empty()).then(|| v.to_string())
    }
}

/// The persisted log: a single sheet inside a workbook document.
#[derive(Debug, Clone)]
pub struct SummaryLog {
    path: PathBuf,
    sheet: String,
    entries: Vec<SummaryEntry>,
}

impl SummaryLog {
    pub fn empty(path: &Path, sheet: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            sheet: sheet.to_string(),
            entries: Vec::new(),
        }
    }

    /// Read the log; a missing document is an empty log.
    pub fn load(store: &dyn DocumentStore, path: &Path, sheet: &str) -> Result<Self> {
        if !path.exists() {
            log::info!("No summary log at {}, starting empty", path.display());
            return Ok(Self::empty(path, sheet));
        }
        let workbook = store.open(path)?;
        let view = workbook.sheet(sheet).ok_or_else(|| AuditError::MissingSheet {
            sheet: sheet.to_string(),
            path: path.display().to_string(),
        })?;

        let columns: HashMap<String, usize> = view
            .header()
            .into_iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| (h, i))
            .collect();
        if !columns.contains_key("ReceivedTime") {
            return Err(AuditError::missing_column(sheet, "ReceivedTime"));
        }

        let mut entries = Vec::new();
        for (i, row) in view.data_rows().iter().enumerate() {
            if row.iter().all(CellValue::is_empty) {
                continue;
            }
            entries.push(SummaryEntry::from_row(&columns, row, i + 1)?);
        }
        log::debug!("Loaded {} log entries from {}", entries.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            sheet: sheet.to_string(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [SummaryEntry] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a batch after the existing entries, order preserved.
    pub fn append(&mut self, batch: Vec<SummaryEntry>) {
        self.entries.extend(batch);
    }

    /// Latest received time in the log, or `default` for an empty log.
    pub fn watermark(&self, default: NaiveDateTime) -> NaiveDateTime {
        self.entries
            .iter()
            .map(|e| e.received_time)
            .max()
            .unwrap_or(default)
    }

    /// Positions of the entries eligible for distribution, in log order.
    pub fn eligible(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_eligible())
            .map(|(i, _)| i)
            .collect()
    }

    /// Render the log view with its formatting.
    pub fn to_sheet(&self, min_columns: u32) -> Sheet {
        let mut rows = vec![LOG_COLUMNS.iter().map(|c| CellValue::text(*c)).collect::<Vec<_>>()];
        rows.extend(self.entries.iter().map(SummaryEntry::to_row));
        let mut sheet = Sheet::with_rows(self.sheet.clone(), rows);
        apply_log_formats(&SheetStyler, &mut sheet, min_columns);
        sheet
    }

    /// Write the whole log back in one go.
    pub fn save(&self, store: &dyn DocumentStore, min_columns: u32) -> Result<()> {
        let mut workbook = Workbook::new();
        workbook.put_sheet(self.to_sheet(min_columns));
        store.save(&workbook, &self.path)?;
        log::debug!("<{}> has been saved successfully", self.path.display());
        Ok(())
    }
}

/// Styling, error highlighting and the `complete` list for the log view.
///
/// Clears any previous directives first, so it can run after every write.
pub fn apply_log_formats(styler: &SheetStyler, sheet: &mut Sheet, min_columns: u32) {
    styler.reset(sheet);
    format::apply_base_styles(styler, sheet, None);

    let last_row = sheet.max_row().saturating_sub(1).max(1);
    let alerts = [
        ("hasdata", Condition::Equals(CellValue::Bool(false))),
        ("n_rows", Condition::Equals(CellValue::Number(0.0))),
        ("n_cols", Condition::LessThan(min_columns as f64)),
        ("p_match", Condition::LessThan(100.0)),
    ];
    for (label, condition) in alerts {
        if let Some(col) = sheet.find_column(label) {
            let rule = ConditionalRule::alert(condition);
            styler.apply_conditional_style(sheet, &rule, CellRange::column_body(col, last_row));
        }
    }

    if let Some(col) = sheet.find_column("complete") {
        styler.apply_validation(
            sheet,
            &ValidationRule::list("TRUE, FALSE"),
            CellRange::column_body(col, last_row),
        );
    }
    format::finish_view(styler, sheet);
}
