//! AuditDesk command-line entry point.
//!
//! ```bash
//! auditdesk [--config FILE] build --source data.json [--saveas out.json]
//! auditdesk ingest [--folder Inbox] [--start "01/02/2024 00:00:00"] [--stop ...]
//! auditdesk distribute [--destination DIR] [--send]
//! auditdesk watermark
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};

use auditdesk_lib::distribute::DistributionTracker;
use auditdesk_lib::error::Result;
use auditdesk_lib::ingest::IngestionPipeline;
use auditdesk_lib::journal::{prune_journal_files, RunJournal};
use auditdesk_lib::mail::{DropFolderMailbox, OutboxSender};
use auditdesk_lib::report::{ReportBuilder, ReportOptions};
use auditdesk_lib::summary::SummaryLog;
use auditdesk_lib::types::{load_config, Config};
use auditdesk_lib::util::{format_timestamp, parse_timestamp};
use auditdesk_lib::workbook::store::FileStore;

/// Audit report builder with incremental ingestion and distribution.
#[derive(Parser)]
#[command(name = "auditdesk", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.auditdesk/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the Audit and Result views for one dataset.
    Build {
        /// Dataset workbook (.json, .xlsx, .xls, .ods)
        #[arg(short, long)]
        source: PathBuf,

        /// Output document; defaults to AUDIT_<timestamp>.json in the workspace
        #[arg(long)]
        saveas: Option<PathBuf>,
    },

    /// Ingest datasets mailed since the last run.
    Ingest {
        /// Mailbox folder; defaults to the configured folder
        #[arg(short, long)]
        folder: Option<String>,

        /// Window start; defaults to one second after the watermark
        #[arg(long, value_parser = parse_cli_timestamp)]
        start: Option<NaiveDateTime>,

        /// Window end; defaults to now
        #[arg(long, value_parser = parse_cli_timestamp)]
        stop: Option<NaiveDateTime>,
    },

    /// Copy completed datasets to their destination folders.
    Distribute {
        /// Destination root; defaults to the configured path or NEW_<timestamp>
        #[arg(short, long)]
        destination: Option<PathBuf>,

        /// Write a notification mail for every copied dataset
        #[arg(long)]
        send: bool,
    },

    /// Print the latest received time in the summary log.
    Watermark,
}

fn parse_cli_timestamp(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    parse_timestamp(raw)
        .ok_or_else(|| format!("'{}' is not a timestamp (dd/mm/YYYY HH:MM:SS or ISO)", raw))
}

fn report_builder(config: &Config) -> Result<ReportBuilder> {
    ReportBuilder::from_settings(
        &FileStore,
        &config.settings_file(),
        &config.settings_sheet,
        ReportOptions::from_config(config),
    )
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    let journal_dir = config.journal_path();
    let pruned = prune_journal_files(&journal_dir, config.journal_retention_days);
    if pruned > 0 {
        log::info!("Pruned {} old journal files", pruned);
    }
    let journal = RunJournal::open(&journal_dir)?;
    log::debug!("Run {} journal at {}", journal.run_id(), journal_dir.display());

    match cli.command {
        Commands::Build { source, saveas } => {
            let builder = report_builder(&config)?;
            let written = builder.create(&FileStore, &source, saveas.as_deref())?;
            journal.info(format!("<{}> has been created successfully", written.display()));
            println!("{}", written.display());
        }
        Commands::Ingest {
            folder,
            start,
            stop,
        } => {
            let builder = report_builder(&config)?;
            let mailbox = DropFolderMailbox::new(config.resolve(&config.mail.root));
            let pipeline =
                IngestionPipeline::new(&config, &builder, &FileStore, &mailbox, &journal);
            let folder = folder.unwrap_or_else(|| config.mail.folder.clone());
            let outcome = pipeline.run(&folder, start, stop)?;
            println!(
                "Listed {} message(s) from {} to {}: {} ingested, {} skipped. Watermark {}",
                outcome.listed,
                format_timestamp(&outcome.window.0),
                format_timestamp(&outcome.window.1),
                outcome.processed,
                outcome.skipped,
                format_timestamp(&outcome.watermark)
            );
        }
        Commands::Distribute { destination, send } => {
            let outbox = OutboxSender::new(config.resolve(&config.distribution.outbox_path));
            let tracker = DistributionTracker::from_settings(&config, &FileStore, &journal)?
                .with_sender(&outbox);
            let destination =
                destination.unwrap_or_else(|| DistributionTracker::default_destination(&config));
            let outcome = tracker.distribute(&destination, send)?;
            println!(
                "{} eligible: {} distributed, {} skipped, {} notified",
                outcome.eligible, outcome.distributed, outcome.skipped, outcome.notified
            );
        }
        Commands::Watermark => {
            let log = SummaryLog::load(&FileStore, &config.log_file(), &config.log_sheet)?;
            println!("{}", format_timestamp(&log.watermark(config.mail.default_start)));
        }
    }

    if journal.errors() > 0 || journal.warnings() > 0 {
        log::info!(
            "Run finished with {} warning(s) and {} error(s)",
            journal.warnings(),
            journal.errors()
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}\n{}", e, e.recovery_suggestion());
            ExitCode::FAILURE
        }
    }
}
