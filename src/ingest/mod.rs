//! Incremental ingestion.
//!
//! Each run lists the messages received after the log's watermark, files the
//! spreadsheet attached to every matching message under its pattern folder,
//! scores it, builds the Audit/Result views in place, and appends one log
//! entry per processed message. The log is written once, at the end of the
//! run; a fatal error leaves it untouched.

pub mod metrics;
pub mod tokens;

use std::path::PathBuf;

use chrono::{Duration, Local, NaiveDateTime};

use crate::error::{AuditError, Result};
use crate::journal::RunJournal;
use crate::mail::{Attachment, MailMessage, MailSource};
use crate::report::ReportBuilder;
use crate::summary::{QualityFields, SummaryEntry, SummaryLog};
use crate::types::Config;
use crate::util::{format_timestamp, operator_identity, sanitize_segment};
use crate::workbook::store::{DocumentFormat, DocumentStore};

const STAGE: &str = "Creating Report";

/// What one ingestion run did.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    /// Inclusive query window.
    pub window: (NaiveDateTime, NaiveDateTime),
    pub listed: usize,
    pub processed: usize,
    pub skipped: usize,
    /// Watermark after the run.
    pub watermark: NaiveDateTime,
}

pub struct IngestionPipeline<'a> {
    config: &'a Config,
    builder: &'a ReportBuilder,
    store: &'a dyn DocumentStore,
    mail: &'a dyn MailSource,
    journal: &'a RunJournal,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        config: &'a Config,
        builder: &'a ReportBuilder,
        store: &'a dyn DocumentStore,
        mail: &'a dyn MailSource,
        journal: &'a RunJournal,
    ) -> Self {
        Self {
            config,
            builder,
            store,
            mail,
            journal,
        }
    }

    fn load_log(&self) -> Result<SummaryLog> {
        SummaryLog::load(self.store, &self.config.log_file(), &self.config.log_sheet)
    }

    /// Latest received time already logged, or the configured default start.
    pub fn current_watermark(&self) -> Result<NaiveDateTime> {
        Ok(self.load_log()?.watermark(self.config.mail.default_start))
    }

    /// One ingestion run over `folder`.
    ///
    /// Without an explicit start the window opens one second after the
    /// watermark; without an explicit stop it closes now.
    pub fn run(
        &self,
        folder: &str,
        start: Option<NaiveDateTime>,
        stop: Option<NaiveDateTime>,
    ) -> Result<IngestOutcome> {
        self.journal.stage_started(STAGE);
        let default_start = self.config.mail.default_start;
        let mut log = self.load_log()?;

        let start = start.unwrap_or_else(|| window_start(&log, default_start));
        let stop = stop.unwrap_or_else(|| Local::now().naive_local());
        let mut outcome = IngestOutcome {
            window: (start, stop),
            listed: 0,
            processed: 0,
            skipped: 0,
            watermark: log.watermark(default_start),
        };
        self.journal.info(format!(
            "Mail window <{}> to <{}>",
            format_timestamp(&start),
            format_timestamp(&stop)
        ));

        let messages = match self.mail.list_messages(folder, start, stop, false) {
            Ok(m) => m,
            Err(e) if !e.is_fatal() => {
                self.journal.error(format!("Cannot read <{}>: {}", folder, e));
                self.journal.stage_finished(STAGE);
                return Ok(outcome);
            }
            Err(e) => return Err(e),
        };
        outcome.listed = messages.len();
        self.journal.info(format!("Number of emails : {}", messages.len()));

        let mandate = self.builder.params().mandate().labels();
        let mut batch = Vec::new();
        for msg in &messages {
            if msg.attachments.is_empty() {
                self.journal.warn(format!(
                    "<{}> received at <{}> does not have attachment(s)",
                    msg.subject,
                    format_timestamp(&msg.received_time)
                ));
                outcome.skipped += 1;
                continue;
            }
            let marker = &self.config.mail.subject_marker;
            if !tokens::subject_matches(&msg.subject, marker) {
                self.journal.warn(unmarked_warning(msg, marker));
                outcome.skipped += 1;
                continue;
            }

            match self.process(msg, &mandate) {
                Ok(entry) => batch.push(entry),
                Err(e) if !e.is_fatal() => {
                    self.journal.error(format!("<{}> skipped: {}", msg.subject, e));
                    outcome.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        outcome.processed = batch.len();
        if !batch.is_empty() {
            log.append(batch);
            log.save(self.store, self.config.quality.min_columns)?;
            self.journal
                .debug(format!("<{}> has been saved successfully", log.path().display()));
        }
        outcome.watermark = log.watermark(default_start);
        self.journal.info(format!(
            "# of emails w/ attachments : {} ({} skipped)",
            outcome.processed, outcome.skipped
        ));
        self.journal.stage_finished(STAGE);
        Ok(outcome)
    }

    /// File, score and build one message's dataset.
    fn process(&self, msg: &MailMessage, mandate: &[String]) -> Result<SummaryEntry> {
        let text = format!("{}\n{}", msg.subject, msg.body);
        let period = tokens::extract_period(&text);
        let pattern = tokens::extract_pattern(&text);
        let workbook = tokens::artifact_name(period.as_deref(), pattern.as_deref());
        let folder = sanitize_segment(pattern.as_deref().unwrap_or(tokens::UNKNOWN_TOKEN));
        let saveas: PathBuf = self.config.repository_dir().join(folder);

        let quality = match first_dataset(&msg.attachments) {
            Some(attachment) => {
                let target = saveas.join(&workbook);
                let quality = self.save_attachment(attachment, &target, mandate)?;
                match self.builder.create(self.store, &target, Some(target.as_path())) {
                    Ok(_) => self
                        .journal
                        .debug(format!("<{}> has been created successfully", workbook)),
                    Err(e) => self
                        .journal
                        .error(format!("Report for <{}> failed: {}", workbook, e)),
                }
                quality
            }
            None => {
                self.journal.warn(format!(
                    "<{}> has no spreadsheet attachment among [{}]",
                    msg.subject,
                    msg.attachment_names().join(",")
                ));
                QualityFields::default()
            }
        };

        let (username, computer) = operator_identity();
        Ok(SummaryEntry {
            period,
            pattern,
            sender: msg.sender_name.clone(),
            to: msg.to.clone(),
            cc: msg.cc.clone(),
            subject: msg.subject.clone(),
            body: tokens::clean_body(&msg.body),
            received_time: msg.received_time,
            creation_time: msg.creation_time,
            sent_on: msg.sent_on,
            workbook,
            saveas: saveas.to_string_lossy().to_string(),
            no_attachment: msg.attachments.len(),
            attachments: msg.attachment_names().join(","),
            quality,
            username: Some(username),
            computer: Some(computer),
            complete: Some(false),
            send_time: None,
            send_user: None,
            send_computer: None,
        })
    }

    /// Decode the attachment, store it at `target` and score it.
    fn save_attachment(
        &self,
        attachment: &Attachment,
        target: &std::path::Path,
        mandate: &[String],
    ) -> Result<QualityFields> {
        let failed = |reason: String| AuditError::AttachmentSaveFailed {
            name: attachment.name.clone(),
            reason,
        };
        let decoded = self
            .store
            .decode(&attachment.name, &attachment.content)
            .map_err(|e| failed(e.to_string()))?;
        if let Some(dir) = target.parent() {
            std::fs::create_dir_all(dir).map_err(|e| failed(e.to_string()))?;
        }
        self.store
            .save(&decoded, target)
            .map_err(|e| failed(e.to_string()))?;
        Ok(metrics::score(&decoded, &self.config.data_sheet, mandate))
    }
}

/// Skip notice for a message whose subject lacks the marker phrase.
fn unmarked_warning(msg: &MailMessage, marker: &str) -> String {
    format!(
        "<{}> received at <{}> does not mention '{}'",
        msg.subject,
        format_timestamp(&msg.received_time),
        marker
    )
}

/// First attachment in a format the document store can read.
fn first_dataset(attachments: &[Attachment]) -> Option<&Attachment> {
    attachments
        .iter()
        .find(|a| DocumentFormat::from_name(&a.name).is_some())
}

/// One second past the latest logged message, never before `default`.
fn window_start(log: &SummaryLog, default: NaiveDateTime) -> NaiveDateTime {
    if log.is_empty() {
        return default;
    }
    (log.watermark(default) + Duration::seconds(1)).max(default)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::params::load_params;
    use crate::params::tests::sample_settings;
    use crate::report::ReportOptions;
    use crate::util::parse_timestamp;
    use crate::workbook::store::FileStore;
    use crate::workbook::{CellValue, Sheet, Workbook};
    use std::cell::RefCell;

    /// In-memory mailbox that filters by window like a real source.
    pub(crate) struct FakeMailbox {
        pub messages: Vec<MailMessage>,
        pub calls: RefCell<Vec<(NaiveDateTime, NaiveDateTime)>>,
    }

    impl MailSource for FakeMailbox {
        fn list_messages(
            &self,
            _folder: &str,
            start: NaiveDateTime,
            stop: NaiveDateTime,
            _sort_descending: bool,
        ) -> Result<Vec<MailMessage>> {
            self.calls.borrow_mut().push((start, stop));
            Ok(self
                .messages
                .iter()
                .filter(|m| m.received_time >= start && m.received_time <= stop)
                .cloned()
                .collect())
        }
    }

    pub(crate) fn dataset_bytes(header: &[&str]) -> Vec<u8> {
        let mut rows = vec![header.iter().map(|h| CellValue::text(*h)).collect::<Vec<_>>()];
        rows.push(vec!["E001".into(), "20240131".into(), 10.0.into()]);
        rows.push(vec!["E002".into(), "20240131".into(), 20.0.into()]);
        let mut wb = Workbook::new();
        wb.put_sheet(Sheet::with_rows("Data", rows));
        serde_json::to_vec(&wb).unwrap()
    }

    pub(crate) fn message(subject: &str, received: &str, with_attachment: bool) -> MailMessage {
        MailMessage {
            sender_name: "Branch".to_string(),
            to: "fraud@example.com".to_string(),
            cc: String::new(),
            subject: subject.to_string(),
            body: "Please find attached\r\nthanks".to_string(),
            received_time: parse_timestamp(received).unwrap(),
            creation_time: None,
            sent_on: None,
            attachments: if with_attachment {
                vec![
                    Attachment {
                        name: "readme.txt".to_string(),
                        content: b"notes".to_vec(),
                    },
                    Attachment {
                        name: "data.json".to_string(),
                        content: dataset_bytes(&["emp_id", "txn_date", "amount"]),
                    },
                ]
            } else {
                Vec::new()
            },
        }
    }

    pub(crate) fn fixture(dir: &std::path::Path) -> (Config, ReportBuilder) {
        let config = Config::for_workspace(dir);
        let params = load_params(&sample_settings()).unwrap();
        let builder = ReportBuilder::new(params, ReportOptions::from_config(&config));
        (config, builder)
    }

    fn mailbox(messages: Vec<MailMessage>) -> FakeMailbox {
        FakeMailbox {
            messages,
            calls: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn test_run_processes_matching_messages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (config, builder) = fixture(dir.path());
        let journal = RunJournal::detached();
        let mail = mailbox(vec![
            message("Internal Fraud Data A001 20240131", "01/02/2024 09:00:00", true),
            message("Lunch?", "01/02/2024 10:00:00", true),
            message("internal fraud data B002 20240131", "01/02/2024 11:00:00", false),
        ]);

        let pipeline = IngestionPipeline::new(&config, &builder, &FileStore, &mail, &journal);
        let outcome = pipeline.run("Inbox", None, None).unwrap();
        assert_eq!(outcome.listed, 3);
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(journal.warnings(), 2);
        assert_eq!(outcome.watermark, parse_timestamp("01/02/2024 09:00:00").unwrap());

        let log = SummaryLog::load(&FileStore, &config.log_file(), "Summary").unwrap();
        let entry = &log.entries()[0];
        assert_eq!(entry.period.as_deref(), Some("20240131"));
        assert_eq!(entry.pattern.as_deref(), Some("A001"));
        assert_eq!(entry.workbook, "20240131_A001.json");
        assert_eq!(entry.body, "Please find attachedthanks");
        assert_eq!(entry.no_attachment, 2);
        assert_eq!(entry.attachments, "readme.txt,data.json");
        assert_eq!(entry.complete, Some(false));
        assert_eq!(entry.quality.p_match, Some(100.0));
        assert_eq!(entry.quality.n_rows, Some(3));
        assert!(entry.send_time.is_none());

        let artifact = FileStore.open(&entry.artifact_path()).unwrap();
        assert_eq!(artifact.sheet_names(), vec!["Audit", "Result"]);
    }

    #[test]
    fn test_rerun_adds_nothing_and_window_moves() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (config, builder) = fixture(dir.path());
        let journal = RunJournal::detached();
        let mail = mailbox(vec![
            message("Internal Fraud Data A001 20240131", "01/02/2024 09:00:00", true),
            message("Internal Fraud Data A002 20240131", "02/02/2024 09:00:00", true),
        ]);
        let pipeline = IngestionPipeline::new(&config, &builder, &FileStore, &mail, &journal);

        let first = pipeline.run("Inbox", None, None).unwrap();
        assert_eq!(first.window.0, config.mail.default_start);
        assert_eq!(first.processed, 2);

        let second = pipeline.run("Inbox", None, None).unwrap();
        assert_eq!(second.listed, 0);
        assert_eq!(second.processed, 0);
        assert_eq!(
            second.window.0,
            parse_timestamp("02/02/2024 09:00:01").unwrap()
        );
        assert_eq!(second.watermark, first.watermark);

        let log = SummaryLog::load(&FileStore, &config.log_file(), "Summary").unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(
            pipeline.current_watermark().unwrap(),
            parse_timestamp("02/02/2024 09:00:00").unwrap()
        );
    }

    #[test]
    fn test_explicit_window_and_append_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (config, builder) = fixture(dir.path());
        let journal = RunJournal::detached();
        let mail = mailbox(vec![
            message("Internal Fraud Data A001 20240131", "01/02/2024 09:00:00", true),
            message("Internal Fraud Data A002 20240229", "01/03/2024 09:00:00", true),
        ]);
        let pipeline = IngestionPipeline::new(&config, &builder, &FileStore, &mail, &journal);

        let stop = parse_timestamp("15/02/2024").unwrap();
        pipeline.run("Inbox", None, Some(stop)).unwrap();
        pipeline.run("Inbox", None, None).unwrap();

        let log = SummaryLog::load(&FileStore, &config.log_file(), "Summary").unwrap();
        let patterns: Vec<_> = log.entries().iter().map(|e| e.pattern.clone().unwrap()).collect();
        assert_eq!(patterns, vec!["A001", "A002"]);
        assert_eq!(mail.calls.borrow()[0].1, stop);
    }

    #[test]
    fn test_bad_attachment_is_skipped_not_logged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (config, builder) = fixture(dir.path());
        let journal = RunJournal::detached();
        let mut broken = message("Internal Fraud Data A001 20240131", "01/02/2024 09:00:00", true);
        broken.attachments[1] = Attachment {
            name: "data.xlsx".to_string(),
            content: b"not a workbook".to_vec(),
        };
        let mail = mailbox(vec![broken]);
        let pipeline = IngestionPipeline::new(&config, &builder, &FileStore, &mail, &journal);

        let outcome = pipeline.run("Inbox", None, None).unwrap();
        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(journal.errors(), 1);
        assert!(!config.log_file().exists(), "nothing to write");
    }

    #[test]
    fn test_build_failure_still_logged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (config, builder) = fixture(dir.path());
        let journal = RunJournal::detached();
        let mut msg = message("Internal Fraud Data A001 20240131", "01/02/2024 09:00:00", true);
        msg.attachments[1].content = dataset_bytes(&["staff", "txn_date", "amount"]);
        let mail = mailbox(vec![msg]);
        let pipeline = IngestionPipeline::new(&config, &builder, &FileStore, &mail, &journal);

        let outcome = pipeline.run("Inbox", None, None).unwrap();
        assert_eq!(outcome.processed, 1);
        assert_eq!(journal.errors(), 1);
        let log = SummaryLog::load(&FileStore, &config.log_file(), "Summary").unwrap();
        assert_eq!(log.entries()[0].quality.p_match, Some(66.67));
    }

    #[test]
    fn test_configured_marker_drives_filter_and_warning() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut config, builder) = fixture(dir.path());
        config.mail.subject_marker = "monthly extract".to_string();
        let journal = RunJournal::detached();
        let mail = mailbox(vec![
            message("Monthly Extract A001 20240131", "01/02/2024 09:00:00", true),
            message("Internal Fraud Data A002 20240131", "01/02/2024 10:00:00", true),
        ]);
        let pipeline = IngestionPipeline::new(&config, &builder, &FileStore, &mail, &journal);

        let outcome = pipeline.run("Inbox", None, None).unwrap();
        assert_eq!((outcome.processed, outcome.skipped), (1, 1));

        let skipped = &mail.messages[1];
        let warning = unmarked_warning(skipped, &config.mail.subject_marker);
        assert_eq!(
            warning,
            "<Internal Fraud Data A002 20240131> received at <01/02/2024 10:00:00> \
             does not mention 'monthly extract'"
        );
    }

    #[test]
    fn test_missing_tokens_file_under_unknown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (config, builder) = fixture(dir.path());
        let journal = RunJournal::detached();
        let mail = mailbox(vec![message("internal fraud data", "01/02/2024 09:00:00", true)]);
        let pipeline = IngestionPipeline::new(&config, &builder, &FileStore, &mail, &journal);

        pipeline.run("Inbox", None, None).unwrap();
        let log = SummaryLog::load(&FileStore, &config.log_file(), "Summary").unwrap();
        let entry = &log.entries()[0];
        assert!(entry.period.is_none() && entry.pattern.is_none());
        assert_eq!(entry.workbook, "UNKNOWN_UNKNOWN.json");
        assert!(entry.artifact_path().starts_with(config.repository_dir().join("UNKNOWN")));
    }
}
