//! Drop-folder mailbox: `{root}/{folder}/*.json`, one envelope per message.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use super::{MailMessage, MailSource};
use crate::error::{AuditError, Result};

#[derive(Debug, Clone)]
pub struct DropFolderMailbox {
    root: PathBuf,
}

impl DropFolderMailbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_envelope(path: &Path) -> Option<MailMessage> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Envelope {} unreadable: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(msg) => Some(msg),
            Err(e) => {
                log::warn!("Envelope {} is not a message: {}", path.display(), e);
                None
            }
        }
    }
}

impl MailSource for DropFolderMailbox {
    fn list_messages(
        &self,
        folder: &str,
        start: NaiveDateTime,
        stop: NaiveDateTime,
        sort_descending: bool,
    ) -> Result<Vec<MailMessage>> {
        let dir = self.root.join(folder);
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| AuditError::MailSourceUnavailable(format!("{}: {}", dir.display(), e)))?;

        let mut messages: Vec<MailMessage> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
            })
            .filter_map(|p| Self::read_envelope(&p))
            .filter(|m| m.received_time >= start && m.received_time <= stop)
            .collect();

        messages.sort_by_key(|m| m.received_time);
        if sort_descending {
            messages.reverse();
        }
        log::debug!(
            "{} message(s) in {} between {} and {}",
            messages.len(),
            dir.display(),
            start,
            stop
        );
        Ok(messages)
    }
}
