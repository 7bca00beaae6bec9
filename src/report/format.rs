//! Formatting shared by the Audit/Result views and the summary log.

use std::collections::HashMap;

use crate::params::validation::ValidationRule;
use crate::params::ColorSpec;
use crate::workbook::style::{CellStyle, ConditionalRule, Styler};
use crate::workbook::{CellRange, Sheet};

/// Last body row to style: at least row 1, so header-only sheets still get a body.
fn body_last_row(sheet: &Sheet) -> usize {
    sheet.max_row().saturating_sub(1).max(1)
}

/// General borders over the whole sheet, blank highlighting over the body,
/// and the header style over row 0.
///
/// `skip_blank` names a column left out of blank highlighting.
pub fn apply_base_styles(styler: &dyn Styler, sheet: &mut Sheet, skip_blank: Option<usize>) {
    let width = sheet.max_column();
    if width == 0 {
        return;
    }
    let last_col = width - 1;
    let last_row = body_last_row(sheet);

    styler.apply_style(sheet, &CellStyle::general(), (0, 0), (last_row, last_col));

    let blank = ConditionalRule::is_blank();
    let spans: Vec<(usize, usize)> = match skip_blank {
        Some(skip) if skip <= last_col => {
            let mut spans = Vec::new();
            if skip > 0 {
                spans.push((0, skip - 1));
            }
            if skip < last_col {
                spans.push((skip + 1, last_col));
            }
            spans
        }
        _ => vec![(0, last_col)],
    };
    for (first_col, span_last) in spans {
        let range = CellRange {
            first_row: 1,
            first_col,
            last_row,
            last_col: span_last,
        };
        styler.apply_conditional_style(sheet, &blank, range);
    }

    styler.apply_style(sheet, &CellStyle::header(), (0, 0), (0, last_col));
}

/// Override header colours for columns listed in `colors`.
pub fn apply_header_colors(styler: &dyn Styler, sheet: &mut Sheet, colors: &ColorSpec) {
    for (col, label) in sheet.header().into_iter().enumerate() {
        if let Some(pair) = colors.get(&label) {
            let style = CellStyle::header_colored(&pair.start_color, &pair.text_color);
            styler.apply_style(sheet, &style, (0, col), (0, 0));
        }
    }
}

/// Apply each column's rule to its body.
///
/// List columns offering `prefill` have every data cell set to it.
/// Returns the labels of pre-filled columns.
pub fn apply_validations(
    styler: &dyn Styler,
    sheet: &mut Sheet,
    rules: &HashMap<String, ValidationRule>,
    prefill: Option<&str>,
) -> Vec<String> {
    let last_row = body_last_row(sheet);
    let data_rows = sheet.max_row().saturating_sub(1);
    let mut filled = Vec::new();
    for (col, label) in sheet.header().into_iter().enumerate() {
        let Some(rule) = rules.get(&label) else {
            continue;
        };
        styler.apply_validation(sheet, rule, CellRange::column_body(col, last_row));
        if let Some(token) = prefill.filter(|t| rule.offers(t)) {
            for row in 1..=data_rows {
                sheet.set(row, col, token);
            }
            filled.push(label);
        }
    }
    filled
}

/// Header filter across every column and gridlines off.
pub fn finish_view(styler: &dyn Styler, sheet: &mut Sheet) {
    let width = sheet.max_column();
    if width > 0 {
        styler.auto_filter(sheet, 0, (0, width - 1));
    }
    styler.hide_gridlines(sheet);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::style::SheetStyler;
    use crate::workbook::CellValue;

    fn sheet() -> Sheet {
        Sheet::with_rows(
            "Audit",
            vec![
                vec!["a".into(), "ref_id".into(), "b".into()],
                vec!["1".into(), "x".into(), CellValue::Empty],
                vec!["2".into(), "y".into(), CellValue::Empty],
            ],
        )
    }

    #[test]
    fn test_blank_highlight_skips_column() {
        let mut s = sheet();
        apply_base_styles(&SheetStyler, &mut s, Some(1));
        let ranges: Vec<String> = s
            .presentation
            .conditional
            .iter()
            .map(|d| d.range.to_a1())
            .collect();
        assert_eq!(ranges, vec!["A2:A3", "C2:C3"]);
        assert_eq!(s.presentation.styles.len(), 2);
    }

    #[test]
    fn test_blank_highlight_skip_first_column() {
        let mut s = sheet();
        apply_base_styles(&SheetStyler, &mut s, Some(0));
        let ranges: Vec<String> = s
            .presentation
            .conditional
            .iter()
            .map(|d| d.range.to_a1())
            .collect();
        assert_eq!(ranges, vec!["B2:C3"]);
    }

    #[test]
    fn test_prefill_list_token() {
        let mut s = sheet();
        let mut rules = HashMap::new();
        rules.insert("b".to_string(), ValidationRule::list("ใช่, ไม่ระบุ"));
        let filled = apply_validations(&SheetStyler, &mut s, &rules, Some("ไม่ระบุ"));
        assert_eq!(filled, vec!["b"]);
        assert_eq!(s.get(1, 2), &CellValue::text("ไม่ระบุ"));
        assert_eq!(s.get(2, 2), &CellValue::text("ไม่ระบุ"));
        assert_eq!(s.max_row(), 3, "no rows are added");
        assert!(s.presentation.validation_at(2, 2).is_some());
        assert!(s.presentation.validation_at(0, 2).is_none());
    }

    #[test]
    fn test_finish_view() {
        let mut s = sheet();
        finish_view(&SheetStyler, &mut s);
        assert_eq!(s.presentation.auto_filter.unwrap().to_a1(), "A1:C3");
        assert!(!s.presentation.show_gridlines);
    }
}
