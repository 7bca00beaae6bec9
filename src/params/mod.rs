//! Settings-sheet parser.
//!
//! The settings sheet has one row per column definition. It declares the
//! validation rule of each column, its header colours, and the groups the
//! column belongs to (with its position inside each group).

pub mod validation;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::workbook::style::{HEADER_FILL, HEADER_FONT_COLOR};
use crate::workbook::{CellValue, Sheet};
use validation::{ValidationKind, ValidationRule};

/// The column groups a settings row can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Group {
    /// Review columns appended to the Audit view.
    Audit,
    /// Columns of the Result view.
    Result,
    /// Fields hashed into the reference id.
    Hash,
    /// Fields a dataset must carry to be complete.
    Mandate,
}

impl Group {
    pub const ALL: [Group; 4] = [Group::Audit, Group::Result, Group::Hash, Group::Mandate];

    /// Header of the group's column in the settings sheet.
    pub fn header(&self) -> &'static str {
        match self {
            Group::Audit => "Audit",
            Group::Result => "Result",
            Group::Hash => "hash",
            Group::Mandate => "mandate",
        }
    }
}

/// Ordered `(position, label)` pairs of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnGroup {
    entries: Vec<(u32, String)>,
}

impl ColumnGroup {
    /// Build from unordered pairs; fails on a repeated position.
    pub fn from_entries(group: Group, mut entries: Vec<(u32, String)>) -> Result<Self> {
        entries.sort_by_key(|(pos, _)| *pos);
        if let Some(w) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(AuditError::invalid_value(
                group.header(),
                format!("position {} is used by both '{}' and '{}'", w[0].0, w[0].1, w[1].1),
            ));
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[(u32, String)] {
        &self.entries
    }

    /// Labels in position order.
    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|(_, l)| l.clone()).collect()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|(_, l)| l == label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Header colours for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorPair {
    pub start_color: String,
    pub text_color: String,
}

pub type ColorSpec = HashMap<String, ColorPair>;

/// Everything the report builder needs from the settings sheet.
#[derive(Debug, Clone, Default)]
pub struct Params {
    pub dv: HashMap<String, ValidationRule>,
    pub hex: ColorSpec,
    groups: HashMap<Group, ColumnGroup>,
}

impl Params {
    pub fn group(&self, group: Group) -> &ColumnGroup {
        static EMPTY: ColumnGroup = ColumnGroup { entries: Vec::new() };
        self.groups.get(&group).unwrap_or(&EMPTY)
    }

    pub fn audit(&self) -> &ColumnGroup {
        self.group(Group::Audit)
    }

    pub fn result(&self) -> &ColumnGroup {
        self.group(Group::Result)
    }

    pub fn hash(&self) -> &ColumnGroup {
        self.group(Group::Hash)
    }

    pub fn mandate(&self) -> &ColumnGroup {
        self.group(Group::Mandate)
    }
}

/// Parse a settings sheet into `Params`.
pub fn load_params(sheet: &Sheet) -> Result<Params> {
    let find = |label: &str| {
        sheet
            .find_column(label)
            .ok_or_else(|| AuditError::missing_column(&sheet.name, label))
    };

    let key_col = find("key")?;
    let type_col = find("type")?;
    let label_col = find("column_label")?;
    let operator_col = find("operator")?;
    let formula1_col = find("formula1")?;
    let formula2_col = find("formula2")?;
    let start_color_col = find("start_color")?;
    let color_col = find("color")?;
    let group_cols = Group::ALL
        .iter()
        .map(|g| find(g.header()).map(|c| (*g, c)))
        .collect::<Result<Vec<_>>>()?;

    let mut params = Params::default();
    let mut group_entries: HashMap<Group, Vec<(u32, String)>> = HashMap::new();

    for (offset, row) in sheet.data_rows().iter().enumerate() {
        let r = offset + 1;
        let key = sheet.get(r, key_col).to_string().trim().to_string();
        if key.is_empty() {
            if row.iter().any(|c| !c.is_empty()) {
                log::debug!("Settings row {} has no key, skipped", r + 1);
            }
            continue;
        }

        let kind_raw = sheet.get(r, type_col).to_string();
        let kind_raw = kind_raw.trim();
        if !kind_raw.is_empty() && !kind_raw.eq_ignore_ascii_case("text") {
            let kind = ValidationKind::parse(kind_raw).ok_or_else(|| {
                AuditError::invalid_value(&key, format!("unknown validation type '{}'", kind_raw))
            })?;
            let operator = sheet.get(r, operator_col).to_string();
            let rule = ValidationRule::from_settings(
                &key,
                kind,
                Some(operator.as_str()),
                sheet.get(r, formula1_col),
                sheet.get(r, formula2_col),
            )?
            .with_prompt_title(&sheet.get(r, label_col).to_string());
            params.dv.insert(key.clone(), rule);
        }

        params.hex.insert(
            key.clone(),
            ColorPair {
                start_color: color_or(sheet.get(r, start_color_col), HEADER_FILL),
                text_color: color_or(sheet.get(r, color_col), HEADER_FONT_COLOR),
            },
        );

        for (group, col) in &group_cols {
            if let Some(pos) = position(&key, *group, sheet.get(r, *col))? {
                group_entries.entry(*group).or_default().push((pos, key.clone()));
            }
        }
    }

    for group in Group::ALL {
        let entries = group_entries.remove(&group).unwrap_or_default();
        params.groups.insert(group, ColumnGroup::from_entries(group, entries)?);
    }

    log::debug!(
        "Loaded {} validation rules, {} audit / {} result / {} hash / {} mandate columns",
        params.dv.len(),
        params.audit().len(),
        params.result().len(),
        params.hash().len(),
        params.mandate().len()
    );
    Ok(params)
}

fn color_or(value: &CellValue, fallback: &str) -> String {
    let text = value.to_string();
    let cleaned = text.trim().trim_start_matches('#');
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Group position of a cell: positive integers include, empty or ≤ 0 excludes.
fn position(key: &str, group: Group, value: &CellValue) -> Result<Option<u32>> {
    if value.is_empty() {
        return Ok(None);
    }
    let n = value.as_f64().ok_or_else(|| {
        AuditError::invalid_value(
            key,
            format!("{} position '{}' is not a number", group.header(), value),
        )
    })?;
    if n <= 0.0 {
        return Ok(None);
    }
    if n.fract() != 0.0 || n > u32::MAX as f64 {
        return Err(AuditError::invalid_value(
            key,
            format!("{} position '{}' is not a whole number", group.header(), value),
        ));
    }
    Ok(Some(n as u32))
}
