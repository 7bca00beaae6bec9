//! Subject/body token extraction.

use std::sync::OnceLock;

use regex::Regex;

/// Placeholder for a token the message did not carry.
pub const UNKNOWN_TOKEN: &str = "UNKNOWN";

fn re_period() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]{8}").expect("period regex should compile"))
}

fn re_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Z][0-9]{3}").expect("pattern regex should compile"))
}

/// First run of eight digits, e.g. `20240131`.
pub fn extract_period(text: &str) -> Option<String> {
    re_period().find(text).map(|m| m.as_str().to_string())
}

/// First capital letter followed by three digits, e.g. `A001`.
pub fn extract_pattern(text: &str) -> Option<String> {
    re_pattern().find(text).map(|m| m.as_str().to_string())
}

/// Case-insensitive substring test of the subject against the marker phrase.
pub fn subject_matches(subject: &str, marker: &str) -> bool {
    subject.to_lowercase().contains(&marker.to_lowercase())
}

/// Body text as stored in the log: line breaks removed.
pub fn clean_body(body: &str) -> String {
    body.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// Artifact file name for a dataset: `{period}_{pattern}.json`.
pub fn artifact_name(period: Option<&str>, pattern: Option<&str>) -> String {
    format!(
        "{}_{}.json",
        period.unwrap_or(UNKNOWN_TOKEN),
        pattern.unwrap_or(UNKNOWN_TOKEN)
    )
}
