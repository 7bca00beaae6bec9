use std::io::Write;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Display format used for timestamps in the log and in messages.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Accepted timestamp layouts, most specific first.
const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d", "%Y%m%d"];

/// Write a string to `path` atomically (temp file in the same directory, then rename).
///
/// Readers never observe a half-written file; a crash leaves the previous
/// content in place.
pub fn atomic_write_str(path: &Path, content: &str) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Serialize `data` as pretty JSON and write it atomically.
pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<(), crate::error::AuditError> {
    let content = serde_json::to_string_pretty(data)?;
    atomic_write_str(path, &format!("{}\n", content))?;
    Ok(())
}

/// Parse a timestamp in any of the accepted layouts.
///
/// Date-only inputs resolve to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    parse_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse a calendar date in any of the accepted layouts.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Format a timestamp the way the log displays it.
pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Identity of the operator running the pipeline: (user, computer).
///
/// Falls back to "unknown" when the environment does not say.
pub fn operator_identity() -> (String, String) {
    let user = first_env(&["USERNAME", "USER", "LOGNAME"]);
    let computer = first_env(&["COMPUTERNAME", "HOSTNAME", "HOST"]);
    (user, computer)
}

fn first_env(keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| std::env::var(k).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Convert a display name to a filename-safe kebab-case slug.
///
/// Example: "Internal Fraud Monitoring Team" → "internal-fraud-monitoring-team"
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Keep a file or folder name on one path segment.
pub fn sanitize_segment(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(
            slugify("Internal Fraud Monitoring Team"),
            "internal-fraud-monitoring-team"
        );
    }

    #[test]
    fn test_slugify_special_chars() {
        assert_eq!(slugify("Re: A001 — 20240131"), "re-a001-20240131");
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(10, 5, 0)
            .unwrap();
        assert_eq!(parse_timestamp("31/01/2024 10:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-31T10:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-31 10:05:00"), Some(expected));
        assert_eq!(parse_timestamp("31/01/2024 10:05"), Some(expected));
    }

    #[test]
    fn test_parse_timestamp_date_only_is_midnight() {
        let dt = parse_timestamp("01/01/2022").unwrap();
        assert_eq!(format_timestamp(&dt), "01/01/2022 00:00:00");
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("A001/../x"), "A001_.._x");
        assert_eq!(sanitize_segment(".."), "_");
        assert_eq!(sanitize_segment(" Fraud Team "), "Fraud Team");
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("out.txt");
        atomic_write_str(&path, "hello").expect("write");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        atomic_write_str(&path, "again").expect("overwrite");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "again");
    }
}
