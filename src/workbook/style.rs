//! Styling collaborator.
//!
//! Styling is recorded as directives on the sheet (`Presentation`) and saved
//! with the workbook; rendering them is up to whatever displays the document.
//! Components only talk to the `Styler` trait.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{CellRange, CellValue, Sheet};
use crate::params::validation::ValidationRule;

const BORDER_COLOR: &str = "2f3542";
const FONT_NAME: &str = "Tahoma";
pub const HEADER_FILL: &str = "D0CECE";
pub const HEADER_FONT_COLOR: &str = "404040";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FillPattern {
    Solid,
    LightUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fill {
    pub pattern: FillPattern,
    pub start_color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Border {
    pub style: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Font {
    pub name: String,
    pub size: f64,
    pub bold: bool,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alignment {
    pub horizontal: String,
    pub vertical: String,
    pub wrap_text: bool,
}

/// A cell style; unset parts leave the cell's existing look alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Fill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
}

fn thin_border() -> Border {
    Border {
        style: "thin".to_string(),
        color: BORDER_COLOR.to_string(),
    }
}

impl CellStyle {
    /// Thin borders and the body font, applied to every populated cell.
    pub fn general() -> Self {
        Self {
            border: Some(thin_border()),
            font: Some(Font {
                name: FONT_NAME.to_string(),
                size: 10.0,
                bold: false,
                color: HEADER_FONT_COLOR.to_string(),
            }),
            ..Self::default()
        }
    }

    /// Header row: solid grey fill, small bold wrapped text.
    pub fn header() -> Self {
        Self::header_colored(HEADER_FILL, HEADER_FONT_COLOR)
    }

    /// Header style with its fill and font colours replaced.
    pub fn header_colored(fill: &str, text: &str) -> Self {
        Self {
            fill: Some(Fill {
                pattern: FillPattern::Solid,
                start_color: fill.to_string(),
            }),
            border: Some(thin_border()),
            font: Some(Font {
                name: FONT_NAME.to_string(),
                size: 9.0,
                bold: true,
                color: text.to_string(),
            }),
            alignment: Some(Alignment {
                horizontal: "center".to_string(),
                vertical: "center".to_string(),
                wrap_text: true,
            }),
        }
    }

    fn hatched(color: &str) -> Self {
        Self {
            fill: Some(Fill {
                pattern: FillPattern::LightUp,
                start_color: color.to_string(),
            }),
            border: Some(thin_border()),
            ..Self::default()
        }
    }

    /// Hatched grey used to highlight blank cells.
    pub fn blank_highlight() -> Self {
        Self::hatched("BFBFBF")
    }

    /// Hatched red used to flag failing quality values.
    pub fn alert() -> Self {
        Self::hatched("FF0000")
    }
}

/// When a conditional style applies to a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Condition {
    IsBlank,
    Equals(CellValue),
    LessThan(f64),
}

impl Condition {
    pub fn matches(&self, value: &CellValue) -> bool {
        match self {
            Condition::IsBlank => value.is_empty(),
            Condition::Equals(expected) => match (expected, value) {
                (CellValue::Bool(b), v) => v.as_bool() == Some(*b),
                (CellValue::Number(n), v) => v.as_f64() == Some(*n),
                (e, v) => e == v,
            },
            Condition::LessThan(limit) => value.as_f64().is_some_and(|v| v < *limit),
        }
    }

    /// Spreadsheet formula for the top-left cell of `range`, e.g. `ISBLANK(A2)` or `D2<12`.
    pub fn formula(&self, range: &CellRange) -> String {
        let cell = format!("{}{}", super::column_letter(range.first_col), range.first_row + 1);
        match self {
            Condition::IsBlank => format!("ISBLANK({})", cell),
            Condition::Equals(v) => format!("{}={}", cell, v),
            Condition::LessThan(n) => format!("{}<{}", cell, CellValue::Number(*n)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalRule {
    pub condition: Condition,
    pub style: CellStyle,
}

impl ConditionalRule {
    pub fn is_blank() -> Self {
        Self {
            condition: Condition::IsBlank,
            style: CellStyle::blank_highlight(),
        }
    }

    pub fn alert(condition: Condition) -> Self {
        Self {
            condition,
            style: CellStyle::alert(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDirective {
    pub range: CellRange,
    pub style: CellStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalDirective {
    pub range: CellRange,
    pub formula: String,
    pub rule: ConditionalRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationDirective {
    pub range: CellRange,
    pub rule: ValidationRule,
}

/// Sheet protection: which columns reviewers may not edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protection {
    pub locked_columns: Vec<String>,
    pub unlocked_columns: Vec<String>,
    /// Hex SHA-256 of the password.
    pub password_hash: String,
}

impl Protection {
    pub fn is_locked(&self, label: &str) -> bool {
        self.locked_columns.iter().any(|c| c == label)
    }

    pub fn verify_password(&self, password: &str) -> bool {
        hash_password(password) == self.password_hash
    }
}

fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn default_gridlines() -> bool {
    true
}

/// Presentation directives attached to a sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    #[serde(default)]
    pub styles: Vec<StyleDirective>,
    #[serde(default)]
    pub conditional: Vec<ConditionalDirective>,
    #[serde(default)]
    pub validations: Vec<ValidationDirective>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protection: Option<Protection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_filter: Option<CellRange>,
    #[serde(default = "default_gridlines")]
    pub show_gridlines: bool,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            styles: Vec::new(),
            conditional: Vec::new(),
            validations: Vec::new(),
            protection: None,
            auto_filter: None,
            show_gridlines: true,
        }
    }
}

impl Presentation {
    /// Validation rule covering a cell, last directive wins.
    pub fn validation_at(&self, row: usize, col: usize) -> Option<&ValidationRule> {
        self.validations
            .iter()
            .rev()
            .find(|d| d.range.contains(row, col))
            .map(|d| &d.rule)
    }

    /// Effective static style of a cell: later directives override earlier ones part by part.
    pub fn style_at(&self, row: usize, col: usize) -> CellStyle {
        let mut merged = CellStyle::default();
        for d in self.styles.iter().filter(|d| d.range.contains(row, col)) {
            if d.style.fill.is_some() {
                merged.fill = d.style.fill.clone();
            }
            if d.style.border.is_some() {
                merged.border = d.style.border.clone();
            }
            if d.style.font.is_some() {
                merged.font = d.style.font.clone();
            }
            if d.style.alignment.is_some() {
                merged.alignment = d.style.alignment.clone();
            }
        }
        merged
    }

    /// Conditional styles whose condition holds for `value` at a cell.
    pub fn conditional_matches(
        &self,
        row: usize,
        col: usize,
        value: &CellValue,
    ) -> Vec<&ConditionalRule> {
        self.conditional
            .iter()
            .filter(|d| d.range.contains(row, col) && d.rule.condition.matches(value))
            .map(|d| &d.rule)
            .collect()
    }
}

/// Styling operations the report and log builders rely on.
pub trait Styler {
    /// Style the block starting at `top_left` and spanning `extent` more rows/columns.
    fn apply_style(
        &self,
        sheet: &mut Sheet,
        style: &CellStyle,
        top_left: (usize, usize),
        extent: (usize, usize),
    );
    fn apply_conditional_style(&self, sheet: &mut Sheet, rule: &ConditionalRule, range: CellRange);
    fn apply_validation(&self, sheet: &mut Sheet, rule: &ValidationRule, range: CellRange);
    /// Lock the named columns; every other header column stays editable.
    fn protect(&self, sheet: &mut Sheet, locked_columns: &[String], password: &str);
    /// Filter on `header_row` across the inclusive column span.
    fn auto_filter(&self, sheet: &mut Sheet, header_row: usize, columns: (usize, usize));
    fn hide_gridlines(&self, sheet: &mut Sheet);
}

/// Records styling into the sheet's `Presentation`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SheetStyler;

impl SheetStyler {
    /// Drop every directive so styling can be reapplied from scratch.
    pub fn reset(&self, sheet: &mut Sheet) {
        sheet.presentation = Presentation::default();
    }
}

impl Styler for SheetStyler {
    fn apply_style(
        &self,
        sheet: &mut Sheet,
        style: &CellStyle,
        top_left: (usize, usize),
        extent: (usize, usize),
    ) {
        sheet.presentation.styles.push(StyleDirective {
            range: CellRange::from_extent(top_left, extent),
            style: style.clone(),
        });
    }

    fn apply_conditional_style(&self, sheet: &mut Sheet, rule: &ConditionalRule, range: CellRange) {
        sheet.presentation.conditional.push(ConditionalDirective {
            formula: rule.condition.formula(&range),
            range,
            rule: rule.clone(),
        });
    }

    fn apply_validation(&self, sheet: &mut Sheet, rule: &ValidationRule, range: CellRange) {
        sheet.presentation.validations.push(ValidationDirective {
            range,
            rule: rule.clone(),
        });
    }

    fn protect(&self, sheet: &mut Sheet, locked_columns: &[String], password: &str) {
        let header = sheet.header();
        let unlocked_columns = header
            .iter()
            .filter(|h| !h.is_empty() && !locked_columns.contains(h))
            .cloned()
            .collect();
        sheet.presentation.protection = Some(Protection {
            locked_columns: locked_columns.to_vec(),
            unlocked_columns,
            password_hash: hash_password(password),
        });
    }

    fn auto_filter(&self, sheet: &mut Sheet, header_row: usize, columns: (usize, usize)) {
        let last_row = sheet.max_row().saturating_sub(1).max(header_row);
        sheet.presentation.auto_filter = Some(CellRange {
            first_row: header_row,
            first_col: columns.0,
            last_row,
            last_col: columns.1,
        });
    }

    fn hide_gridlines(&self, sheet: &mut Sheet) {
        sheet.presentation.show_gridlines = false;
    }
}
