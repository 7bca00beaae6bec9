//! Data-validation rules declared in the settings sheet.
//!
//! Date and time bounds are stored as serial offsets: dates as whole days
//! from 31/12/1899 plus one, times as the fraction of a day since 00:00:00.
//! List and custom bounds are stored as quoted literals.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::workbook::CellValue;

/// Longest option string a list rule may carry.
const MAX_LIST_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    Whole,
    Decimal,
    List,
    Date,
    Time,
    TextLength,
    Custom,
}

impl ValidationKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "whole" => Some(ValidationKind::Whole),
            "decimal" => Some(ValidationKind::Decimal),
            "list" => Some(ValidationKind::List),
            "date" => Some(ValidationKind::Date),
            "time" => Some(ValidationKind::Time),
            "textlength" => Some(ValidationKind::TextLength),
            "custom" => Some(ValidationKind::Custom),
            _ => None,
        }
    }

    /// List and custom rules carry a literal and ignore the operator.
    pub fn takes_operator(&self) -> bool {
        !matches!(self, ValidationKind::List | ValidationKind::Custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Between,
    NotBetween,
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl Operator {
    /// Accepts `notBetween`, `not_between`, `NOTBETWEEN`, ...
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "between" => Some(Operator::Between),
            "notbetween" => Some(Operator::NotBetween),
            "equal" => Some(Operator::Equal),
            "notequal" => Some(Operator::NotEqual),
            "greaterthan" => Some(Operator::GreaterThan),
            "lessthan" => Some(Operator::LessThan),
            "greaterthanorequal" => Some(Operator::GreaterThanOrEqual),
            "lessthanorequal" => Some(Operator::LessThanOrEqual),
            _ => None,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Operator::Between | Operator::NotBetween)
    }
}

fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != '_' && *c != ' ')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Optional prompt and error texts shown with a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationMessages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub kind: ValidationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound2: Option<String>,
    pub allow_blank: bool,
    #[serde(default)]
    pub messages: ValidationMessages,
}

impl ValidationRule {
    /// List rule over comma-separated options.
    pub fn list(options: &str) -> Self {
        Self {
            kind: ValidationKind::List,
            operator: None,
            bound1: Some(quote_list(options)),
            bound2: None,
            allow_blank: true,
            messages: ValidationMessages::default(),
        }
    }

    /// Build a rule from one settings row.
    ///
    /// `key` names the row in errors. Range operators need both bounds;
    /// other operators use the first bound only. A rule without an operator
    /// behaves as `between`.
    pub fn from_settings(
        key: &str,
        kind: ValidationKind,
        operator: Option<&str>,
        formula1: &CellValue,
        formula2: &CellValue,
    ) -> Result<Self> {
        let mut rule = Self {
            kind,
            operator: None,
            bound1: None,
            bound2: None,
            allow_blank: true,
            messages: ValidationMessages::default(),
        };

        if !kind.takes_operator() {
            rule.bound1 = match formula1 {
                v if v.is_empty() => None,
                v if kind == ValidationKind::List => Some(quote_list(&v.to_string())),
                v => Some(format!("\"{}\"", v.to_string().trim())),
            };
            if rule.bound1.is_none() {
                return Err(AuditError::invalid_value(key, "formula1 is required"));
            }
            return Ok(rule);
        }

        let operator = match operator.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Operator::parse(raw).ok_or_else(|| {
                AuditError::invalid_value(key, format!("unknown operator '{}'", raw))
            })?,
            None => Operator::Between,
        };
        rule.operator = Some(operator);
        rule.bound1 = convert_bound(key, kind, formula1)?;
        if rule.bound1.is_none() {
            return Err(AuditError::invalid_value(key, "formula1 is required"));
        }
        if operator.is_range() {
            rule.bound2 = convert_bound(key, kind, formula2)?;
            if rule.bound2.is_none() {
                return Err(AuditError::invalid_value(
                    key,
                    "between operators need both formula1 and formula2",
                ));
            }
        }
        Ok(rule)
    }

    pub fn with_prompt_title(mut self, title: &str) -> Self {
        if !title.trim().is_empty() {
            self.messages.prompt_title = Some(title.trim().to_string());
        }
        self
    }

    /// Options of a list rule, unquoted and trimmed.
    pub fn options(&self) -> Vec<String> {
        if self.kind != ValidationKind::List {
            return Vec::new();
        }
        self.bound1
            .as_deref()
            .map(|b| b.trim_matches('"'))
            .unwrap_or_default()
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect()
    }

    /// True for list rules whose option string contains `token`.
    pub fn offers(&self, token: &str) -> bool {
        self.kind == ValidationKind::List
            && self.bound1.as_deref().is_some_and(|b| b.contains(token))
    }
}

/// Quote a list option string, trimmed and cut to the length limit.
fn quote_list(options: &str) -> String {
    let trimmed: String = options.trim().chars().take(MAX_LIST_LEN).collect();
    format!("\"{}\"", trimmed.trim())
}

fn convert_bound(key: &str, kind: ValidationKind, value: &CellValue) -> Result<Option<String>> {
    if value.is_empty() {
        return Ok(None);
    }
    let converted = match kind {
        ValidationKind::Date => date_offset(value)
            .map(|d| d.to_string())
            .ok_or_else(|| AuditError::invalid_value(key, format!("'{}' is not a date", value)))?,
        ValidationKind::Time => time_offset(value)
            .map(|t| t.to_string())
            .ok_or_else(|| AuditError::invalid_value(key, format!("'{}' is not a time", value)))?,
        _ => value.to_string().trim().to_string(),
    };
    Ok(Some(converted))
}

fn date_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 31)?.and_hms_opt(0, 0, 0)
}

/// Day offset of a date bound: whole days since 31/12/1899, plus one.
pub fn date_offset(value: &CellValue) -> Option<i64> {
    let dt = value.as_datetime()?;
    let seconds = (dt - date_epoch()?).num_seconds();
    Some(seconds.div_euclid(86_400) + 1)
}

/// Time-of-day offset of a time bound: fraction of a day, 15 decimals.
pub fn time_offset(value: &CellValue) -> Option<f64> {
    let time = match value {
        CellValue::DateTime(dt) => dt.time(),
        CellValue::Text(s) => parse_time(s)?,
        _ => return None,
    };
    let seconds = time.num_seconds_from_midnight() as f64;
    Some(round_to(seconds / 86_400.0, 15))
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
        .or_else(|| crate::util::parse_timestamp(raw).map(|dt| dt.time()))
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_date_is_one() {
        assert_eq!(date_offset(&CellValue::text("31/12/1899")), Some(1));
        assert_eq!(date_offset(&CellValue::text("01/01/1900")), Some(2));
        assert_eq!(date_offset(&CellValue::text("31/12/1899 23:59:59")), Some(1));
    }

    #[test]
    fn test_one_second_time_offset() {
        let offset = time_offset(&CellValue::text("00:00:01")).unwrap();
        assert_eq!(offset, round_to(1.0 / 86_400.0, 15));
        assert_eq!(time_offset(&CellValue::text("12:00")), Some(0.5));
    }

    #[test]
    fn test_operator_parse_tolerates_case_and_underscores() {
        assert_eq!(Operator::parse("not_between"), Some(Operator::NotBetween));
        assert_eq!(Operator::parse("GreaterThanOrEqual"), Some(Operator::GreaterThanOrEqual));
        assert_eq!(Operator::parse("sometimes"), None);
        assert_eq!(ValidationKind::parse("text_length"), Some(ValidationKind::TextLength));
        assert_eq!(ValidationKind::parse("textLength"), Some(ValidationKind::TextLength));
    }

    #[test]
    fn test_between_needs_both_bounds() {
        let err = ValidationRule::from_settings(
            "amount",
            ValidationKind::Whole,
            Some("between"),
            &CellValue::Number(1.0),
            &CellValue::Empty,
        )
        .unwrap_err();
        assert!(matches!(err, AuditError::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_single_bound_operator() {
        let rule = ValidationRule::from_settings(
            "amount",
            ValidationKind::Decimal,
            Some("greaterThan"),
            &CellValue::Number(0.5),
            &CellValue::Number(99.0),
        )
        .unwrap();
        assert_eq!(rule.operator, Some(Operator::GreaterThan));
        assert_eq!(rule.bound1.as_deref(), Some("0.5"));
        assert_eq!(rule.bound2, None);
    }

    #[test]
    fn test_date_rule_converts_bounds() {
        let rule = ValidationRule::from_settings(
            "incident_date",
            ValidationKind::Date,
            Some("between"),
            &CellValue::text("31/12/1899"),
            &CellValue::text("2024-01-31"),
        )
        .unwrap();
        assert_eq!(rule.bound1.as_deref(), Some("1"));
        assert_eq!(rule.bound2.as_deref(), Some("45322"));
    }

    #[test]
    fn test_list_rule_quoted_and_truncated() {
        let long = format!(" {} ", "x".repeat(300));
        let rule = ValidationRule::from_settings(
            "status",
            ValidationKind::List,
            None,
            &CellValue::text(long),
            &CellValue::Empty,
        )
        .unwrap();
        let bound = rule.bound1.unwrap();
        assert_eq!(bound.chars().count(), MAX_LIST_LEN + 2);
        assert!(bound.starts_with('"') && bound.ends_with('"'));
    }

    #[test]
    fn test_list_options_and_offers() {
        let rule = ValidationRule::list("ใช่, ไม่ใช่, ไม่ระบุ");
        assert_eq!(rule.options(), vec!["ใช่", "ไม่ใช่", "ไม่ระบุ"]);
        assert!(rule.offers("ไม่ระบุ"));
        assert!(!ValidationRule::list("TRUE, FALSE").offers("ไม่ระบุ"));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let err = ValidationRule::from_settings(
            "amount",
            ValidationKind::Whole,
            Some("around"),
            &CellValue::Number(1.0),
            &CellValue::Empty,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown operator"));
    }
}
