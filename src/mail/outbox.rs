//! Outbox sender: each outgoing mail becomes a JSON file in the outbox folder.
//!
//! Mails with `display` set are written as drafts for a person to review;
//! the rest are queued for the transport.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use super::{MailSender, OutgoingMail};
use crate::error::Result;
use crate::util::{slugify, write_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Draft,
    Queued,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboxRecord<'a> {
    status: OutboxStatus,
    created_at: String,
    #[serde(flatten)]
    mail: &'a OutgoingMail,
}

#[derive(Debug, Clone)]
pub struct OutboxSender {
    dir: PathBuf,
}

impl OutboxSender {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First free `{timestamp}_{slug}[_n].json` path.
    fn next_path(&self, subject: &str) -> PathBuf {
        let stem = format!("{}_{}", Local::now().format("%Y%m%d%H%M%S"), slugify(subject));
        let mut path = self.dir.join(format!("{}.json", stem));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{}_{}.json", stem, n));
            n += 1;
        }
        path
    }
}

impl MailSender for OutboxSender {
    fn send_message(&self, mail: &OutgoingMail) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let status = if mail.options.display {
            OutboxStatus::Draft
        } else {
            OutboxStatus::Queued
        };
        let record = OutboxRecord {
            status,
            created_at: Local::now().to_rfc3339(),
            mail,
        };
        let path = self.next_path(&mail.subject);
        write_json(&path, &record)?;
        log::debug!("Outgoing mail '{}' written to {}", mail.subject, path.display());
        Ok(())
    }
}
