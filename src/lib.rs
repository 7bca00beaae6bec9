//! AuditDesk: audit-ready reports from mailed datasets.
//!
//! A settings sheet declares which columns an Audit and a Result view carry,
//! how they are validated and coloured, and which source columns feed the
//! per-row reference id. Around the report builder sits a stateful pipeline:
//! ingestion files each mailed dataset, scores it and appends it to a summary
//! log; distribution copies the entries reviewers marked complete and stamps
//! them so they never go out twice.

pub mod distribute;
pub mod error;
pub mod hasher;
pub mod ingest;
pub mod journal;
pub mod mail;
pub mod params;
pub mod report;
pub mod summary;
pub mod types;
pub mod util;
pub mod workbook;
