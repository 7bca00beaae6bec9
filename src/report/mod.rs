//! Audit/Result report builder.
//!
//! The Audit view is the source data plus review columns and a reference id
//! per row; the Result view holds the reference id, the linking key and the
//! Result columns, one row per Audit row, for downstream entry.

pub mod format;

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::{AuditError, Result};
use crate::hasher::{DigestKind, ReferenceHasher};
use crate::params::{load_params, Params};
use crate::types::Config;
use crate::workbook::store::DocumentStore;
use crate::workbook::style::{SheetStyler, Styler};
use crate::workbook::{CellValue, Sheet, Workbook};

/// Names and secrets the builder needs besides the settings sheet.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub data_sheet: String,
    pub audit_sheet: String,
    pub result_sheet: String,
    pub ref_id_column: String,
    pub linking_key: String,
    pub unspecified_token: String,
    pub secret_key: String,
    pub digest: DigestKind,
    pub password: String,
    /// Folder for outputs written without an explicit destination.
    pub workspace: PathBuf,
}

impl ReportOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            data_sheet: config.data_sheet.clone(),
            audit_sheet: config.audit_sheet.clone(),
            result_sheet: config.result_sheet.clone(),
            ref_id_column: config.report.ref_id_column.clone(),
            linking_key: config.report.linking_key.clone(),
            unspecified_token: config.report.unspecified_token.clone(),
            secret_key: config.report.secret_key.clone(),
            digest: config.report.digest,
            password: config.report.password.clone(),
            workspace: PathBuf::from(&config.workspace_path),
        }
    }
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Builds the Audit and Result views from a dataset.
pub struct ReportBuilder {
    params: Params,
    options: ReportOptions,
    hasher: ReferenceHasher,
    styler: Box<dyn Styler>,
}

impl ReportBuilder {
    pub fn new(params: Params, options: ReportOptions) -> Self {
        let hasher = ReferenceHasher::new(&options.secret_key, options.digest);
        Self {
            params,
            options,
            hasher,
            styler: Box::new(SheetStyler),
        }
    }

    /// Load `Params` from the named sheet of a settings document.
    pub fn from_settings(
        store: &dyn DocumentStore,
        path: &Path,
        sheet: &str,
        options: ReportOptions,
    ) -> Result<Self> {
        if !path.exists() {
            return Err(AuditError::InvalidSourcePath(path.to_path_buf()));
        }
        let workbook = store.open(path)?;
        let settings = workbook.sheet(sheet).ok_or_else(|| AuditError::MissingSheet {
            sheet: sheet.to_string(),
            path: path.display().to_string(),
        })?;
        let params = load_params(settings)?;
        log::info!("Report settings loaded from {} [{}]", path.display(), sheet);
        Ok(Self::new(params, options))
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Build `(audit, result)` from the data sheet of a dataset.
    pub fn build(&self, source: &Sheet) -> Result<(Sheet, Sheet)> {
        let styler = self.styler.as_ref();
        let ref_label = self.options.ref_id_column.as_str();

        let mut audit = Sheet::with_rows(self.options.audit_sheet.clone(), source.rows.clone());
        let (n_rows, n_cols) = audit.trim_trailing_empty();
        audit.square_up();

        // Review columns go right after the last source column.
        for (i, label) in self.params.audit().labels().into_iter().enumerate() {
            audit.set(0, n_cols + i, label);
        }
        audit.square_up();

        if !self.params.audit().contains(ref_label) {
            return Err(AuditError::missing_column(&self.options.audit_sheet, ref_label));
        }
        let ref_col = audit
            .find_column(ref_label)
            .ok_or_else(|| AuditError::missing_column(&self.options.audit_sheet, ref_label))?;
        let hash_cols = self
            .params
            .hash()
            .labels()
            .iter()
            .map(|label| {
                audit
                    .find_column(label)
                    .ok_or_else(|| AuditError::missing_column(&self.options.audit_sheet, label))
            })
            .collect::<Result<Vec<_>>>()?;
        let link_col = self.linking_column(&audit)?;

        for row in 1..n_rows {
            let id = self
                .hasher
                .hash_values(hash_cols.iter().map(|c| audit.get(row, *c)));
            audit.set(row, ref_col, id);
        }

        format::apply_base_styles(styler, &mut audit, Some(ref_col));
        format::apply_header_colors(styler, &mut audit, &self.params.hex);
        let token = self.options.unspecified_token.as_str();
        let filled = format::apply_validations(styler, &mut audit, &self.params.dv, Some(token));
        if !filled.is_empty() {
            log::debug!("Pre-filled '{}' into {:?}", token, filled);
        }

        let editable: Vec<String> = self
            .params
            .audit()
            .labels()
            .into_iter()
            .filter(|l| l != ref_label)
            .collect();
        let locked: Vec<String> = audit
            .header()
            .into_iter()
            .filter(|h| !editable.contains(h))
            .collect();
        styler.protect(&mut audit, &locked, &self.options.password);
        format::finish_view(styler, &mut audit);

        let result = self.result_view(&audit, ref_col, link_col);
        log::debug!(
            "Built {} with {} rows x {} columns",
            self.options.audit_sheet,
            audit.max_row(),
            audit.max_column()
        );
        Ok((audit, result))
    }

    /// Column of the linking key in the Audit header; must match exactly once.
    fn linking_column(&self, audit: &Sheet) -> Result<usize> {
        let matches = audit.find_columns_ci(&self.options.linking_key);
        match matches.as_slice() {
            [col] => Ok(*col),
            _ => Err(AuditError::AmbiguousMandatoryField {
                label: self.options.linking_key.clone(),
                matches: matches.len(),
            }),
        }
    }

    fn result_view(&self, audit: &Sheet, ref_col: usize, link_col: usize) -> Sheet {
        let styler = self.styler.as_ref();
        let ref_label = audit.get(0, ref_col).to_string();
        let link_label = audit.get(0, link_col).to_string();

        let mut header = vec![CellValue::text(&ref_label), CellValue::text(&link_label)];
        header.extend(
            self.params
                .result()
                .labels()
                .into_iter()
                .filter(|l| *l != ref_label && !l.eq_ignore_ascii_case(&link_label))
                .map(CellValue::Text),
        );
        let width = header.len();

        let mut rows = vec![header];
        for row in 1..audit.max_row() {
            let mut cells = vec![CellValue::Empty; width];
            cells[0] = audit.get(row, ref_col).clone();
            cells[1] = audit.get(row, link_col).clone();
            rows.push(cells);
        }

        let mut result = Sheet::with_rows(self.options.result_sheet.clone(), rows);
        format::apply_base_styles(styler, &mut result, Some(0));
        format::apply_header_colors(styler, &mut result, &self.params.hex);
        let token = self.options.unspecified_token.as_str();
        format::apply_validations(styler, &mut result, &self.params.dv, Some(token));
        format::finish_view(styler, &mut result);
        result
    }

    /// Build from a dataset workbook; the output holds only the two views.
    ///
    /// `origin` names the dataset in errors.
    pub fn build_workbook(&self, source: &Workbook, origin: &str) -> Result<Workbook> {
        let data = source
            .sheet(&self.options.data_sheet)
            .ok_or_else(|| AuditError::MissingSheet {
                sheet: self.options.data_sheet.clone(),
                path: origin.to_string(),
            })?;
        let (audit, result) = self.build(data)?;
        let mut output = Workbook::new();
        output.put_sheet(audit);
        output.put_sheet(result);
        Ok(output)
    }

    /// Open `source`, build both views and save them.
    ///
    /// Without a usable `saveas` the output goes to `AUDIT_%Y%m%d%H%M%S.json`
    /// in the workspace. `saveas` may equal `source`. Returns the written path.
    pub fn create(
        &self,
        store: &dyn DocumentStore,
        source: &Path,
        saveas: Option<&Path>,
    ) -> Result<PathBuf> {
        let workbook = store.open(source)?;
        let output = self.build_workbook(&workbook, &source.display().to_string())?;
        let target = self.resolve_saveas(saveas);
        store.save(&output, &target)?;
        log::info!("<{}> has been created successfully", target.display());
        Ok(target)
    }

    fn resolve_saveas(&self, saveas: Option<&Path>) -> PathBuf {
        let usable = saveas.filter(|p| match p.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.exists(),
            _ => true,
        });
        match usable {
            Some(p) => p.to_path_buf(),
            None => self
                .options
                .workspace
                .join(format!("AUDIT_{}.json", Local::now().format("%Y%m%d%H%M%S"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::tests::sample_settings;
    use crate::workbook::store::FileStore;
    use crate::workbook::style::Condition;

    fn builder() -> ReportBuilder {
        let params = load_params(&sample_settings()).unwrap();
        ReportBuilder::new(params, ReportOptions::default())
    }

    fn data() -> Sheet {
        Sheet::with_rows(
            "Data",
            vec![
                vec!["emp_id".into(), "txn_date".into(), "amount".into(), CellValue::Empty],
                vec!["E001".into(), "20240131".into(), 100.0.into(), CellValue::Empty],
                vec!["E002".into(), CellValue::Empty, 250.5.into()],
                vec!["E001".into(), "20240131".into(), 7.0.into()],
                vec![CellValue::Empty, CellValue::Empty],
            ],
        )
    }

    #[test]
    fn test_audit_header_and_ref_ids() {
        let (audit, _) = builder().build(&data()).unwrap();
        assert_eq!(
            audit.header(),
            vec!["emp_id", "txn_date", "amount", "ref_id", "finding", "comment"]
        );
        assert_eq!(audit.max_row(), 4, "trailing empty row trimmed");

        let ids: Vec<String> = (1..4).map(|r| audit.get(r, 3).to_string()).collect();
        assert_eq!(ids[0], ids[2], "same hash fields give the same id");
        assert_ne!(ids[0], ids[1]);
        let hasher = ReferenceHasher::new("admin", DigestKind::Sha1);
        assert_eq!(ids[1], hasher.hash_str("E002"));
        assert_eq!(ids[0], hasher.hash_str("E00120240131"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let b = builder();
        let (first, _) = b.build(&data()).unwrap();
        let (second, _) = b.build(&data()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unspecified_prefill_and_protection() {
        let (audit, _) = builder().build(&data()).unwrap();
        for r in 1..4 {
            assert_eq!(audit.get(r, 4), &CellValue::text("ไม่ระบุ"));
            assert!(audit.get(r, 5).is_empty());
        }
        let protection = audit.presentation.protection.as_ref().unwrap();
        assert_eq!(protection.unlocked_columns, vec!["finding", "comment"]);
        assert!(protection.is_locked("ref_id"));
        assert!(protection.is_locked("emp_id"));
        assert!(!audit.presentation.show_gridlines);
        assert_eq!(audit.presentation.auto_filter.unwrap().to_a1(), "A1:F4");
    }

    #[test]
    fn test_ref_id_column_not_blank_highlighted() {
        let (audit, _) = builder().build(&data()).unwrap();
        let hits = audit
            .presentation
            .conditional
            .iter()
            .filter(|d| d.rule.condition == Condition::IsBlank && d.range.contains(1, 3))
            .count();
        assert_eq!(hits, 0);
        assert!(!audit.presentation.conditional_matches(2, 1, &CellValue::Empty).is_empty());
    }

    #[test]
    fn test_header_colors_applied() {
        let (audit, _) = builder().build(&data()).unwrap();
        let style = audit.presentation.style_at(0, 4);
        assert_eq!(style.fill.unwrap().start_color, "FFC000");
    }

    #[test]
    fn test_result_view_links_audit_rows() {
        let (audit, result) = builder().build(&data()).unwrap();
        assert_eq!(result.name, "Result");
        assert_eq!(result.header(), vec!["ref_id", "emp_id", "finding", "comment"]);
        assert_eq!(result.max_row(), audit.max_row());
        for r in 1..result.max_row() {
            assert_eq!(result.get(r, 0), audit.get(r, 3));
            assert_eq!(result.get(r, 1), audit.get(r, 0));
            assert!(result.get(r, 3).is_empty());
        }
        assert!(result.presentation.protection.is_none());
    }

    #[test]
    fn test_linking_key_must_be_unique() {
        let mut source = data();
        source.rows[0][3] = CellValue::text("EMP_ID");
        let err = builder().build(&source).unwrap_err();
        assert!(matches!(err, AuditError::AmbiguousMandatoryField { matches: 2, .. }));

        let mut source = data();
        source.rows[0][0] = CellValue::text("employee");
        let err = builder().build(&source).unwrap_err();
        // emp_id is also a hash column, so the hash lookup fails first
        assert!(matches!(
            err,
            AuditError::ConfigMissingColumn { ref column, .. } if column == "emp_id"
        ));
    }

    #[test]
    fn test_linking_key_missing_without_hash_dependency() {
        let mut options = ReportOptions::default();
        options.linking_key = "staff_no".to_string();
        let params = load_params(&sample_settings()).unwrap();
        let err = ReportBuilder::new(params, options).build(&data()).unwrap_err();
        assert!(matches!(err, AuditError::AmbiguousMandatoryField { matches: 0, .. }));
    }

    #[test]
    fn test_missing_hash_column() {
        let mut source = data();
        source.rows[0][1] = CellValue::text("date");
        let err = builder().build(&source).unwrap_err();
        assert!(matches!(
            err,
            AuditError::ConfigMissingColumn { ref column, .. } if column == "txn_date"
        ));
    }

    #[test]
    fn test_create_in_place_and_default_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("20240131_A001.json");
        let mut wb = Workbook::new();
        wb.put_sheet(data());
        FileStore.save(&wb, &path).unwrap();

        let mut options = ReportOptions::default();
        options.workspace = dir.path().to_path_buf();
        let params = load_params(&sample_settings()).unwrap();
        let b = ReportBuilder::new(params, options);

        let written = b.create(&FileStore, &path, Some(path.as_path())).unwrap();
        assert_eq!(written, path);
        let saved = FileStore.open(&path).unwrap();
        assert_eq!(saved.sheet_names(), vec!["Audit", "Result"]);

        let mut wb = Workbook::new();
        wb.put_sheet(data());
        let source = dir.path().join("source.json");
        FileStore.save(&wb, &source).unwrap();
        let bogus = dir.path().join("missing-dir").join("out.json");
        let written = b.create(&FileStore, &source, Some(bogus.as_path())).unwrap();
        let name = written.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("AUDIT_") && name.ends_with(".json"));
        assert_eq!(written.parent(), Some(dir.path()));
    }

    #[test]
    fn test_build_workbook_requires_data_sheet() {
        let mut wb = Workbook::new();
        wb.put_sheet(Sheet::new("Sheet1"));
        let err = builder().build_workbook(&wb, "x.json").unwrap_err();
        assert!(matches!(err, AuditError::MissingSheet { ref sheet, .. } if sheet == "Data"));
    }

    #[test]
    fn test_from_settings_missing_path() {
        let err = ReportBuilder::from_settings(
            &FileStore,
            Path::new("/no/such/settings.json"),
            "Settings",
            ReportOptions::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, AuditError::InvalidSourcePath(_)));
    }
}
