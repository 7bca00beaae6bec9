//! Distribution of completed datasets.
//!
//! Entries marked complete and never sent are copied to
//! `{destination}/{folder for pattern}/{workbook}` and stamped with the send
//! time, user and computer. The stamp is what keeps an entry from going out
//! twice. Anything that stops an entry from being copied leaves it unstamped,
//! so the next run picks it up again.

pub mod notify;
pub mod tables;

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, Timelike};

use crate::error::{AuditError, Result};
use crate::ingest::tokens::UNKNOWN_TOKEN;
use crate::journal::RunJournal;
use crate::mail::MailSender;
use crate::summary::{SummaryEntry, SummaryLog};
use crate::types::Config;
use crate::util::{operator_identity, sanitize_segment};
use crate::workbook::store::DocumentStore;

pub use tables::{load_tables, Recipients, RenameTable};

const STAGE: &str = "Sending Files";

/// What one distribution run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistributionOutcome {
    pub eligible: usize,
    pub distributed: usize,
    pub skipped: usize,
    pub notified: usize,
}

pub struct DistributionTracker<'a> {
    config: &'a Config,
    rename: RenameTable,
    recipients: Recipients,
    store: &'a dyn DocumentStore,
    sender: Option<&'a dyn MailSender>,
    journal: &'a RunJournal,
}

impl<'a> DistributionTracker<'a> {
    pub fn new(
        config: &'a Config,
        rename: RenameTable,
        recipients: Recipients,
        store: &'a dyn DocumentStore,
        journal: &'a RunJournal,
    ) -> Self {
        Self {
            config,
            rename,
            recipients,
            store,
            sender: None,
            journal,
        }
    }

    /// Tracker with tables read from the configured settings workbook.
    pub fn from_settings(
        config: &'a Config,
        store: &'a dyn DocumentStore,
        journal: &'a RunJournal,
    ) -> Result<Self> {
        let (rename, recipients) = load_tables(
            store,
            &config.settings_file(),
            &config.rename_sheet,
            &config.recipients_sheet,
        )?;
        Ok(Self::new(config, rename, recipients, store, journal))
    }

    /// Mail collaborator used when notifications are requested.
    pub fn with_sender(mut self, sender: &'a dyn MailSender) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Configured destination root, or a fresh `NEW_%Y%m%d%H%M%S` folder in
    /// the workspace.
    pub fn default_destination(config: &Config) -> PathBuf {
        match &config.distribution.destination_path {
            Some(path) => config.resolve(path),
            None => config.resolve(&format!("NEW_{}", Local::now().format("%Y%m%d%H%M%S"))),
        }
    }

    /// One distribution run into `destination_root`.
    pub fn distribute(&self, destination_root: &Path, send: bool) -> Result<DistributionOutcome> {
        self.journal.stage_started(STAGE);
        self.journal
            .info(format!("Main folder : <{}>", destination_root.display()));
        std::fs::create_dir_all(destination_root)?;

        let mut log =
            SummaryLog::load(self.store, &self.config.log_file(), &self.config.log_sheet)?;
        let eligible = log.eligible();
        let mut outcome = DistributionOutcome {
            eligible: eligible.len(),
            ..DistributionOutcome::default()
        };
        self.journal
            .info(format!("Number of unsent files : {}", eligible.len()));

        let sender = match (send, self.sender) {
            (true, None) => {
                self.journal
                    .warn("Notifications requested but no mail sender is configured");
                None
            }
            (true, Some(sender)) => {
                if self.recipients.to().is_empty() {
                    self.journal.warn("No 'to' recipients configured for notifications");
                }
                Some(sender)
            }
            (false, _) => None,
        };
        let (user, computer) = operator_identity();

        for idx in eligible {
            let folder = match self.deliver(&log.entries()[idx], destination_root) {
                Ok(d) => d,
                Err(e) if e.is_per_item() => {
                    self.journal.warn(format!("Copy failed. {}", e));
                    outcome.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let entry = &mut log.entries_mut()[idx];
            if entry.mark_sent(now(), &user, &computer) {
                outcome.distributed += 1;
            }

            if let Some(sender) = sender {
                let mail = notify::compose_notification(
                    &self.config.distribution,
                    &self.recipients,
                    &folder,
                    &entry.workbook,
                    entry.period.as_deref().unwrap_or(UNKNOWN_TOKEN),
                );
                match sender.send_message(&mail) {
                    Ok(()) => {
                        outcome.notified += 1;
                        self.journal.debug(format!(
                            "Notification email of <{}> has been sent out successfully",
                            entry.workbook
                        ));
                    }
                    Err(e) => self
                        .journal
                        .error(format!("Notification of <{}> failed: {}", entry.workbook, e)),
                }
            }
        }

        if !log.is_empty() {
            log.save(self.store, self.config.quality.min_columns)?;
        }
        self.journal.info(format!(
            "Distributed {} of {} ({} skipped, {} notified)",
            outcome.distributed, outcome.eligible, outcome.skipped, outcome.notified
        ));
        self.journal.stage_finished(STAGE);
        Ok(outcome)
    }

    /// Copy one entry's artifact to its destination folder; returns the
    /// folder name.
    fn deliver(&self, entry: &SummaryEntry, root: &Path) -> Result<String> {
        let pattern = entry.pattern.as_deref().unwrap_or(UNKNOWN_TOKEN);
        let folder = self
            .rename
            .folder_for(pattern)
            .ok_or_else(|| AuditError::UnknownPattern(pattern.to_string()))?
            .to_string();

        let source = entry.artifact_path();
        if !source.exists() {
            return Err(AuditError::MissingArtifact(source));
        }

        let dir = root.join(sanitize_segment(&folder));
        let copy_failed = |path: &Path, e: std::io::Error| AuditError::CopyFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| copy_failed(&dir, e))?;
            self.journal
                .debug(format!("<{}> has been created successfully", dir.display()));
        }

        let target = dir.join(&entry.workbook);
        let existed = target.exists();
        if existed && !self.config.distribution.overwrite {
            return Err(AuditError::DestinationCollision(target));
        }
        std::fs::copy(&source, &target).map_err(|e| copy_failed(&target, e))?;
        self.journal.debug(format!(
            "<{}> has been {} successfully",
            entry.workbook,
            if existed { "overwritten" } else { "copied" }
        ));
        Ok(folder)
    }
}

/// Current local time to the second.
fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
