use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::hasher::DigestKind;

/// Configuration stored in ~/.auditdesk/config.json
///
/// Every path may be relative; relative paths resolve against `workspacePath`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_workspace")]
    pub workspace_path: String,
    /// Workbook holding the schema-config, rename and recipients sheets.
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
    #[serde(default = "default_settings_sheet")]
    pub settings_sheet: String,
    #[serde(default = "default_rename_sheet")]
    pub rename_sheet: String,
    #[serde(default = "default_recipients_sheet")]
    pub recipients_sheet: String,
    /// Sheet of an incoming dataset that holds the records.
    #[serde(default = "default_data_sheet")]
    pub data_sheet: String,
    #[serde(default = "default_audit_sheet")]
    pub audit_sheet: String,
    #[serde(default = "default_result_sheet")]
    pub result_sheet: String,
    #[serde(default = "default_log_path")]
    pub log_path: String,
    #[serde(default = "default_log_sheet")]
    pub log_sheet: String,
    /// Root folder under which saved datasets are filed by pattern.
    #[serde(default = "default_repository_path")]
    pub repository_path: String,
    #[serde(default = "default_journal_dir")]
    pub journal_dir: String,
    #[serde(default = "default_journal_retention_days")]
    pub journal_retention_days: u32,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub quality: QualityConfig,
}

fn default_workspace() -> String {
    ".".to_string()
}

fn default_settings_path() -> String {
    "settings.json".to_string()
}

fn default_settings_sheet() -> String {
    "Settings".to_string()
}

fn default_rename_sheet() -> String {
    "Rename".to_string()
}

fn default_recipients_sheet() -> String {
    "Recipients".to_string()
}

fn default_data_sheet() -> String {
    "Data".to_string()
}

fn default_audit_sheet() -> String {
    "Audit".to_string()
}

fn default_result_sheet() -> String {
    "Result".to_string()
}

fn default_log_path() -> String {
    "data/InternalFraud.json".to_string()
}

fn default_log_sheet() -> String {
    "Summary".to_string()
}

fn default_repository_path() -> String {
    "data".to_string()
}

fn default_journal_dir() -> String {
    "logging".to_string()
}

fn default_journal_retention_days() -> u32 {
    crate::journal::JOURNAL_RETENTION_DAYS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_path: default_workspace(),
            settings_path: default_settings_path(),
            settings_sheet: default_settings_sheet(),
            rename_sheet: default_rename_sheet(),
            recipients_sheet: default_recipients_sheet(),
            data_sheet: default_data_sheet(),
            audit_sheet: default_audit_sheet(),
            result_sheet: default_result_sheet(),
            log_path: default_log_path(),
            log_sheet: default_log_sheet(),
            repository_path: default_repository_path(),
            journal_dir: default_journal_dir(),
            journal_retention_days: default_journal_retention_days(),
            mail: MailConfig::default(),
            report: ReportConfig::default(),
            distribution: DistributionConfig::default(),
            quality: QualityConfig::default(),
        }
    }
}

impl Config {
    /// Resolve a configured path against the workspace.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            Path::new(&self.workspace_path).join(p)
        }
    }

    pub fn settings_file(&self) -> PathBuf {
        self.resolve(&self.settings_path)
    }

    pub fn log_file(&self) -> PathBuf {
        self.resolve(&self.log_path)
    }

    pub fn repository_dir(&self) -> PathBuf {
        self.resolve(&self.repository_path)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.resolve(&self.journal_dir)
    }

    /// Config rooted at an explicit workspace, defaults everywhere else.
    pub fn for_workspace(workspace: &Path) -> Self {
        Self {
            workspace_path: workspace.to_string_lossy().to_string(),
            ..Self::default()
        }
    }
}

// =============================================================================
// Mail source
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailConfig {
    /// Root of the drop-folder mailbox.
    #[serde(default = "default_mail_root")]
    pub root: String,
    #[serde(default = "default_mail_folder")]
    pub folder: String,
    /// Phrase a subject must contain (case-insensitive) to be ingested.
    #[serde(default = "default_subject_marker")]
    pub subject_marker: String,
    /// Watermark used when the log has no entries yet.
    #[serde(default = "default_start")]
    pub default_start: NaiveDateTime,
}

fn default_mail_root() -> String {
    "mailbox".to_string()
}

fn default_mail_folder() -> String {
    "Inbox".to_string()
}

fn default_subject_marker() -> String {
    "internal fraud data".to_string()
}

fn default_start() -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2022, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            root: default_mail_root(),
            folder: default_mail_folder(),
            subject_marker: default_subject_marker(),
            default_start: default_start(),
        }
    }
}

// =============================================================================
// Report building
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    /// Key for the keyed reference-id digest.
    #[serde(default = "default_secret")]
    pub secret_key: String,
    #[serde(default)]
    pub digest: DigestKind,
    /// Sheet-protection password.
    #[serde(default = "default_secret")]
    pub password: String,
    #[serde(default = "default_ref_id_column")]
    pub ref_id_column: String,
    /// Column carried next to ref_id into the Result view.
    #[serde(default = "default_linking_key")]
    pub linking_key: String,
    /// List option that marks "unspecified"; columns offering it are pre-filled.
    #[serde(default = "default_unspecified_token")]
    pub unspecified_token: String,
}

fn default_secret() -> String {
    "admin".to_string()
}

fn default_ref_id_column() -> String {
    "ref_id".to_string()
}

fn default_linking_key() -> String {
    "emp_id".to_string()
}

fn default_unspecified_token() -> String {
    "ไม่ระบุ".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret(),
            digest: DigestKind::default(),
            password: default_secret(),
            ref_id_column: default_ref_id_column(),
            linking_key: default_linking_key(),
            unspecified_token: default_unspecified_token(),
        }
    }
}

// =============================================================================
// Distribution
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionConfig {
    /// Replace files that already exist at the destination.
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Leave notifications as drafts instead of queueing them.
    #[serde(default = "default_display")]
    pub display: bool,
    #[serde(default = "default_importance")]
    pub importance: u8,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: u8,
    /// Base URL of the shared destination folder, used to link notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_base: Option<String>,
    #[serde(default = "default_outbox")]
    pub outbox_path: String,
    /// Destination root; `NEW_%Y%m%d%H%M%S` under the workspace when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_path: Option<String>,
}

fn default_subject() -> String {
    "Internal Fraud Monitoring Team".to_string()
}

fn default_display() -> bool {
    true
}

fn default_importance() -> u8 {
    2
}

fn default_sensitivity() -> u8 {
    1
}

fn default_outbox() -> String {
    "outbox".to_string()
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            subject: default_subject(),
            display: default_display(),
            importance: default_importance(),
            sensitivity: default_sensitivity(),
            link_base: None,
            outbox_path: default_outbox(),
            destination_path: None,
        }
    }
}

// =============================================================================
// Quality thresholds
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityConfig {
    /// Datasets narrower than this are highlighted in the log.
    #[serde(default = "default_min_columns")]
    pub min_columns: u32,
}

fn default_min_columns() -> u32 {
    12
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_columns: default_min_columns(),
        }
    }
}

/// Default config location: `~/.auditdesk/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".auditdesk").join("config.json"))
}

/// Load the configuration from `path`, or from the default location.
///
/// A missing file yields `Config::default()` rooted at the current directory.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(AuditError::InvalidSourcePath(p.to_path_buf()));
            }
            p.to_path_buf()
        }
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => {
                log::info!("No config file found, using defaults");
                return Ok(Config::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let config: Config = serde_json::from_str(&content)?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.settings_sheet, "Settings");
        assert_eq!(config.log_sheet, "Summary");
        assert_eq!(config.mail.subject_marker, "internal fraud data");
        assert_eq!(config.report.ref_id_column, "ref_id");
        assert_eq!(config.report.digest, DigestKind::Sha1);
        assert!(!config.distribution.overwrite);
        assert_eq!(config.quality.min_columns, 12);
        assert_eq!(
            crate::util::format_timestamp(&config.mail.default_start),
            "01/01/2022 00:00:00"
        );
    }

    #[test]
    fn test_camel_case_overrides() {
        let json = r#"{
            "workspacePath": "/srv/audit",
            "logPath": "state/log.json",
            "report": { "linkingKey": "EMP_NO", "digest": "sha256" },
            "distribution": { "overwrite": true, "linkBase": "https://share.example/fraud/" }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.log_file(), PathBuf::from("/srv/audit/state/log.json"));
        assert_eq!(config.report.linking_key, "EMP_NO");
        assert_eq!(config.report.digest, DigestKind::Sha256);
        assert!(config.distribution.overwrite);
        assert_eq!(
            config.distribution.link_base.as_deref(),
            Some("https://share.example/fraud/")
        );
    }

    #[test]
    fn test_resolve_keeps_absolute_paths() {
        let config = Config::for_workspace(Path::new("/srv/audit"));
        assert_eq!(config.resolve("/tmp/x.json"), PathBuf::from("/tmp/x.json"));
        assert_eq!(config.resolve("data"), PathBuf::from("/srv/audit/data"));
    }

    #[test]
    fn test_load_config_missing_explicit_path() {
        let err = load_config(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(matches!(err, AuditError::InvalidSourcePath(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "dataSheet": "Records" }"#).unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.data_sheet, "Records");
        assert_eq!(config.audit_sheet, "Audit");
    }
}
