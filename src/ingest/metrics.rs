//! Completeness metrics of a saved dataset.

use crate::params::validation::round_to;
use crate::summary::QualityFields;
use crate::workbook::{column_letter, Workbook};

/// Score a dataset workbook against its data sheet and mandatory labels.
pub fn score(workbook: &Workbook, data_sheet: &str, mandate: &[String]) -> QualityFields {
    let names = workbook.sheet_names();
    let data = workbook.sheet(data_sheet);
    let hasdata = data.is_some();
    let (n_rows, n_cols) = data.map(|s| (s.max_row(), s.max_column())).unwrap_or((0, 0));

    let last_col = n_cols.max(1);
    let last_row = n_rows.max(2);
    let range = format!("A2:{}{}", column_letter(last_col - 1), last_row);

    let n_points = data
        .map(|s| {
            (1..last_row)
                .flat_map(|r| (0..last_col).map(move |c| (r, c)))
                .filter(|(r, c)| !s.get(*r, *c).is_empty())
                .count()
        })
        .unwrap_or(0);

    let capacity = ((n_rows as i64 - 1) * n_cols as i64).max(1);
    let p_point = round_to(100.0 * n_points as f64 / capacity as f64, 2);

    let p_match = match data {
        None => 0.0,
        Some(_) if mandate.is_empty() => 100.0,
        Some(s) => {
            let header = s.header();
            let present = mandate.iter().filter(|m| header.contains(m)).count();
            round_to(100.0 * present as f64 / mandate.len() as f64, 2)
        }
    };

    QualityFields {
        sheets: Some(names.join(",")),
        n_sheets: Some(names.len()),
        hasdata: Some(hasdata),
        n_rows: Some(n_rows),
        n_cols: Some(n_cols),
        range: Some(range),
        n_points: Some(n_points),
        p_point: Some(p_point),
        p_match: Some(p_match),
    }
}
