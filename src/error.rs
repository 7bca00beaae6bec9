//! Error types for report building, ingestion and distribution
//!
//! Errors are classified by blast radius:
//! - Fatal: configuration problems, missing sources, an unusable log. The
//!   enclosing run aborts before anything is persisted.
//! - Per-item: one message or one log entry could not be handled. The item is
//!   logged, left in its prior state and the batch continues.

use std::path::PathBuf;
use thiserror::Error;

/// Error types for the audit pipeline
#[derive(Debug, Error)]
pub enum AuditError {
    // Fatal errors
    #[error("Sheet '{sheet}' is missing required column '{column}'")]
    ConfigMissingColumn { sheet: String, column: String },

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidConfigValue { key: String, reason: String },

    #[error("Source path does not exist: {0}")]
    InvalidSourcePath(PathBuf),

    #[error("Sheet '{sheet}' not found in {path}")]
    MissingSheet { sheet: String, path: String },

    #[error("Column '{label}' matched {matches} header columns (expected exactly one)")]
    AmbiguousMandatoryField { label: String, matches: usize },

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Per-item errors
    #[error("Failed to save attachment '{name}': {reason}")]
    AttachmentSaveFailed { name: String, reason: String },

    #[error("Mail source unavailable: {0}")]
    MailSourceUnavailable(String),

    #[error("Destination already exists: {0}")]
    DestinationCollision(PathBuf),

    #[error("No destination folder configured for pattern '{0}'")]
    UnknownPattern(String),

    #[error("Saved artifact not found: {0}")]
    MissingArtifact(PathBuf),

    #[error("Failed to copy to {path}: {reason}")]
    CopyFailed { path: PathBuf, reason: String },
}

impl AuditError {
    /// Returns true if this error must abort the enclosing run
    pub fn is_fatal(&self) -> bool {
        !self.is_per_item()
    }

    /// Returns true if this error only affects a single message or log entry
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            AuditError::AttachmentSaveFailed { .. }
                | AuditError::MailSourceUnavailable(_)
                | AuditError::DestinationCollision(_)
                | AuditError::UnknownPattern(_)
                | AuditError::MissingArtifact(_)
                | AuditError::CopyFailed { .. }
        )
    }

    /// Shorthand for a missing column in a named sheet.
    pub fn missing_column(sheet: &str, column: &str) -> Self {
        AuditError::ConfigMissingColumn {
            sheet: sheet.to_string(),
            column: column.to_string(),
        }
    }

    /// Shorthand for a rejected configuration value.
    pub fn invalid_value(key: &str, reason: impl Into<String>) -> Self {
        AuditError::InvalidConfigValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Get a user-facing recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            AuditError::ConfigMissingColumn { .. } => {
                "Add the missing column header to the settings sheet."
            }
            AuditError::InvalidConfigValue { .. } => "Fix the value in the settings sheet.",
            AuditError::InvalidSourcePath(_) => "Check the configured file paths.",
            AuditError::MissingSheet { .. } => "Check the sheet names in the workbook.",
            AuditError::AmbiguousMandatoryField { .. } => {
                "Make the linking column appear exactly once in the data header."
            }
            AuditError::UnsupportedFormat(_) => "Save the document with a .json extension.",
            AuditError::Spreadsheet(_) => "Check the attachment opens as a spreadsheet.",
            AuditError::Json(_) => "Check the document is valid JSON.",
            AuditError::Io(_) => "Check file permissions and disk space.",
            AuditError::AttachmentSaveFailed { .. } => {
                "The message stays unlogged; fix the attachment and re-run with an explicit start."
            }
            AuditError::MailSourceUnavailable(_) => "Check the mailbox folder exists.",
            AuditError::DestinationCollision(_) => {
                "Enable overwrite or remove the existing file; the entry is retried next run."
            }
            AuditError::UnknownPattern(_) => "Add the pattern to the rename table.",
            AuditError::MissingArtifact(_) => "Re-ingest the dataset or fix the saveas path.",
            AuditError::CopyFailed { .. } => {
                "Check the destination folder is writable; the entry is retried next run."
            }
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AuditError>;
