//! Plain-text run summaries printed with `--summary`.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{merge::YearMerge, pipeline::PipelineContext, reconcile::CategoryReconciliation};

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(sanitize_cell(cell).chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths
        .iter()
        .map(|w| "-".repeat((*w).max(1)))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn reconcile_rows(
    context: &PipelineContext,
    categories: &[CategoryReconciliation],
) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = strings(&["year", "category", "rows", "columns", "copied"]);
    let rows = context
        .iter()
        .map(|(year, category, table)| {
            let copied = categories
                .iter()
                .find(|run| run.category == category)
                .map(|run| run.missing.len())
                .unwrap_or_default();
            vec![
                year.to_string(),
                category.to_string(),
                table.row_count().to_string(),
                table.column_count().to_string(),
                copied.to_string(),
            ]
        })
        .collect();
    (headers, rows)
}

pub fn merge_rows(merges: &[YearMerge]) -> (Vec<String>, Vec<Vec<String>>) {
    let mut headers = strings(&["year", "crashes", "with_vehicles"]);
    if let Some(first) = merges.first() {
        for stage in &first.stages {
            headers.push(format!("{}_matched", stage.category));
            headers.push(format!("{}_ambiguous", stage.category));
        }
    }
    headers.push("rows".to_string());
    let rows = merges
        .iter()
        .map(|merged| {
            let mut row = vec![
                merged.year.to_string(),
                merged.crashes.to_string(),
                merged.crashes_with_vehicles.to_string(),
            ];
            for stage in &merged.stages {
                row.push(stage.stats.matched.to_string());
                row.push(stage.stats.ambiguous.to_string());
            }
            row.push(merged.table.row_count().to_string());
            row
        })
        .collect();
    (headers, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_table_aligns_columns() {
        let headers = strings(&["year", "rows"]);
        let rows = vec![strings(&["2017", "12"]), strings(&["2016", "9"])];
        let rendered = render_table(&headers, &rows);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines, vec!["year  rows", "----  ----", "2017  12", "2016  9"]);
    }

    #[test]
    fn render_table_flattens_control_characters() {
        let headers = strings(&["note"]);
        let rows = vec![strings(&["a\tb"])];
        let rendered = render_table(&headers, &rows);
        assert_eq!(rendered.lines().nth(2), Some("a b"));
    }
}
