//! Run journal: the audit log stream for one pipeline run.
//!
//! Every skip, failure and milestone is mirrored to the `log` facade and
//! appended to `{journal_dir}/ASOF_{YYYYMMDD}.txt`. A journal is created per
//! run and passed to each component explicitly; nothing here is global.
//! Old journal files are pruned by age.

use std::cell::Cell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use log::Level;

use crate::error::Result;

/// How many days to keep journal files before pruning.
pub const JOURNAL_RETENTION_DAYS: u32 = 30;

const JOURNAL_PREFIX: &str = "ASOF_";

/// Run-scoped audit log stream.
#[derive(Debug)]
pub struct RunJournal {
    run_id: String,
    path: Option<PathBuf>,
    warnings: Cell<usize>,
    errors: Cell<usize>,
}

impl RunJournal {
    /// Open today's journal file under `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
        let filename = format!("{}{}.txt", JOURNAL_PREFIX, Local::now().format("%Y%m%d"));
        Ok(Self {
            run_id: new_run_id(),
            path: Some(dir.join(filename)),
            warnings: Cell::new(0),
            errors: Cell::new(0),
        })
    }

    /// A journal that only writes to the `log` facade.
    pub fn detached() -> Self {
        Self {
            run_id: new_run_id(),
            path: None,
            warnings: Cell::new(0),
            errors: Cell::new(0),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Path of the journal file, if this journal is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of warnings recorded so far in this run.
    pub fn warnings(&self) -> usize {
        self.warnings.get()
    }

    /// Number of errors recorded so far in this run.
    pub fn errors(&self) -> usize {
        self.errors.get()
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.record(Level::Debug, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.record(Level::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.warnings.set(self.warnings.get() + 1);
        self.record(Level::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.errors.set(self.errors.get() + 1);
        self.record(Level::Error, message.as_ref());
    }

    /// Mark the start of a named stage ("Initialize [stage]").
    pub fn stage_started(&self, stage: &str) {
        self.info(format!("Initialize [{}]", stage));
    }

    /// Mark the end of a named stage ("Terminate [stage]").
    pub fn stage_finished(&self, stage: &str) {
        self.info(format!("Terminate [{}]", stage));
    }

    fn record(&self, level: Level, message: &str) {
        let short_id = &self.run_id[..8.min(self.run_id.len())];
        log::log!(level, "[{}] {}", short_id, message);

        let Some(path) = &self.path else {
            return;
        };
        let line = format!(
            "{} : {} : [{}] {}\n",
            Local::now().format("%m/%d/%Y %I:%M:%S %p"),
            level,
            short_id,
            message
        );
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = written {
            log::warn!("Journal write to {} failed: {}", path.display(), e);
        }
    }
}

fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Delete journal files older than the retention period.
///
/// Only `ASOF_*.txt` files are considered. Returns the number of files pruned.
pub fn prune_journal_files(dir: &Path, retention_days: u32) -> usize {
    if !dir.exists() {
        return 0;
    }

    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
    let cutoff_ts = cutoff.timestamp();

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return 0,
    };

    let mut pruned = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_journal = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(JOURNAL_PREFIX) && n.ends_with(".txt"))
            .unwrap_or(false);
        if !is_journal {
            continue;
        }
        let mtime = match path.metadata().and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => continue,
        };
        let mtime_secs = mtime
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        if mtime_secs < cutoff_ts && std::fs::remove_file(&path).is_ok() {
            pruned += 1;
        }
    }
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_appends_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = RunJournal::open(dir.path()).expect("open");

        journal.info("first");
        journal.warn("<Re: lunch> does not have attachment(s)");

        let path = journal.path().unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(": INFO : "));
        assert!(lines[0].ends_with("first"));
        assert!(lines[1].contains(": WARN : "));
        assert_eq!(journal.warnings(), 1);
        assert_eq!(journal.errors(), 0);
    }

    #[test]
    fn test_journal_filename_is_dated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = RunJournal::open(&dir.path().join("logging")).expect("open");
        let name = journal.path().unwrap().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("ASOF_"));
        assert!(name.ends_with(".txt"));
        assert_eq!(name.len(), "ASOF_20240131.txt".len());
    }

    #[test]
    fn test_detached_journal_counts() {
        let journal = RunJournal::detached();
        journal.error("boom");
        assert!(journal.path().is_none());
        assert_eq!(journal.errors(), 1);
    }

    #[test]
    fn test_prune_removes_old_keeps_recent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let recent = dir.path().join("ASOF_20990101.txt");
        let old = dir.path().join("ASOF_20000101.txt");
        let other = dir.path().join("notes.txt");
        for p in [&recent, &old, &other] {
            std::fs::write(p, "x").unwrap();
        }

        let old_time =
            std::time::SystemTime::now() - std::time::Duration::from_secs(60 * 24 * 3600);
        for p in [&old, &other] {
            filetime::set_file_mtime(p, filetime::FileTime::from_system_time(old_time))
                .expect("set mtime");
        }

        let pruned = prune_journal_files(dir.path(), JOURNAL_RETENTION_DAYS);
        assert_eq!(pruned, 1);
        assert!(recent.exists());
        assert!(!old.exists());
        assert!(other.exists(), "non-journal files are left alone");
    }

    #[test]
    fn test_prune_missing_dir() {
        assert_eq!(prune_journal_files(Path::new("/no/such/journal/dir"), 30), 0);
    }
}
