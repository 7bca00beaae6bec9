//! Rename and recipients tables from the settings workbook.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{AuditError, Result};
use crate::workbook::store::DocumentStore;
use crate::workbook::{Sheet, Workbook};

/// Pattern code to destination folder name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenameTable {
    folders: HashMap<String, String>,
}

impl RenameTable {
    /// First column is the pattern, second the folder. Rows without a
    /// pattern are ignored.
    pub fn from_sheet(sheet: &Sheet) -> Result<Self> {
        if sheet.max_column() < 2 {
            return Err(AuditError::missing_column(&sheet.name, "folder"));
        }
        let folders = sheet
            .data_rows()
            .iter()
            .filter_map(|row| {
                let pattern = row.first()?.to_string().trim().to_string();
                let folder = row.get(1)?.to_string().trim().to_string();
                (!pattern.is_empty() && !folder.is_empty()).then_some((pattern, folder))
            })
            .collect();
        Ok(Self { folders })
    }

    pub fn folder_for(&self, pattern: &str) -> Option<&str> {
        self.folders.get(pattern).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

impl FromIterator<(String, String)> for RenameTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            folders: iter.into_iter().collect(),
        }
    }
}

/// Notification addresses grouped by send stage (`to`, `cc`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recipients {
    groups: HashMap<String, Vec<String>>,
}

impl Recipients {
    /// Reads the `Send` and `Email` columns. A cell may hold several
    /// addresses separated by `;`.
    pub fn from_sheet(sheet: &Sheet) -> Result<Self> {
        let send_col = sheet
            .find_column("Send")
            .ok_or_else(|| AuditError::missing_column(&sheet.name, "Send"))?;
        let email_col = sheet
            .find_column("Email")
            .ok_or_else(|| AuditError::missing_column(&sheet.name, "Email"))?;

        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        for row in sheet.data_rows() {
            let stage = row
                .get(send_col)
                .map(|c| c.to_string().trim().to_lowercase())
                .unwrap_or_default();
            if stage.is_empty() {
                continue;
            }
            let emails = row.get(email_col).map(|c| c.to_string()).unwrap_or_default();
            groups.entry(stage).or_default().extend(
                emails
                    .split(';')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string),
            );
        }
        Ok(Self { groups })
    }

    pub fn stage(&self, stage: &str) -> &[String] {
        self.groups
            .get(&stage.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn to(&self) -> &[String] {
        self.stage("to")
    }

    pub fn cc(&self) -> &[String] {
        self.stage("cc")
    }

    /// Addresses of one stage joined with `;`.
    pub fn joined(&self, stage: &str) -> String {
        self.stage(stage).join(";")
    }
}

fn required_sheet<'a>(workbook: &'a Workbook, sheet: &str, path: &Path) -> Result<&'a Sheet> {
    workbook.sheet(sheet).ok_or_else(|| AuditError::MissingSheet {
        sheet: sheet.to_string(),
        path: path.display().to_string(),
    })
}

/// Load both tables from the settings document.
pub fn load_tables(
    store: &dyn DocumentStore,
    path: &Path,
    rename_sheet: &str,
    recipients_sheet: &str,
) -> Result<(RenameTable, Recipients)> {
    if !path.exists() {
        return Err(AuditError::InvalidSourcePath(path.to_path_buf()));
    }
    let workbook = store.open(path)?;
    let rename = RenameTable::from_sheet(required_sheet(&workbook, rename_sheet, path)?)?;
    let recipients = Recipients::from_sheet(required_sheet(&workbook, recipients_sheet, path)?)?;
    log::debug!(
        "Loaded {} rename rows and {} recipient stages from {}",
        rename.len(),
        recipients.groups.len(),
        path.display()
    );
    Ok((rename, recipients))
}
