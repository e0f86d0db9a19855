//! Plain-text table rendering for terminal output.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{
    analyzer::AnalysisReport,
    audit::SchemaChangeRecord,
    drift::{DriftReport, SchemaChange},
    migration::MigrationSuggestions,
    schema::{ColumnSchema, TableSchema},
};

pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let mut output = String::new();
    let header_line = format_row(headers.iter().copied(), &widths);
    let _ = writeln!(output, "{header_line}");

    let separators = widths.iter().map(|w| "-".repeat((*w).max(3))).collect::<Vec<_>>();
    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let _ = writeln!(
        output,
        "{}",
        format_row(separators.iter().map(String::as_str), &separator_widths)
    );

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row.iter().map(String::as_str), &widths));
    }
    output
}

fn format_row<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(widths.len());
    for (value, width) in values.zip(widths) {
        let sanitized = sanitize_cell(value);
        let padding = width.saturating_sub(display_width(&sanitized));
        let mut cell = sanitized.into_owned();
        cell.push_str(&" ".repeat(padding));
        cells.push(cell);
    }
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape, e.g. \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn column_row(column: &ColumnSchema) -> Vec<String> {
    let range = match (column.min_value, column.max_value) {
        (Some(min), Some(max)) => format!("{min}..{max}"),
        _ => String::new(),
    };
    let length = match (column.min_length, column.max_length) {
        (Some(min), Some(max)) => format!("{min}..{max}"),
        _ => String::new(),
    };
    vec![
        column.name.clone(),
        column.data_type.to_string(),
        format!("{:.2}", column.confidence_score),
        if column.nullable { "yes" } else { "no" }.to_string(),
        if column.unique { "yes" } else { "no" }.to_string(),
        column.cardinality.to_string(),
        format!("{:.1}%", column.null_percentage * 100.0),
        range,
        length,
        column.sample_values.join(", "),
    ]
}

pub fn render_schema(schema: &TableSchema) -> String {
    let mut output = format!(
        "Table '{}' version {} ({} row(s), checksum {})\n",
        schema.table_name, schema.version, schema.row_count, schema.checksum
    );
    let rows = schema.columns.iter().map(column_row).collect::<Vec<_>>();
    output.push_str(&render_table(
        &[
            "column", "type", "confidence", "nullable", "unique", "distinct", "nulls", "range",
            "length", "samples",
        ],
        &rows,
    ));
    output
}

pub fn render_changes(changes: &[SchemaChange]) -> String {
    let rows = changes
        .iter()
        .map(|change| {
            vec![
                change.change_type.to_string(),
                optional(change.column_name.as_deref()),
                format!("{:.2}", change.impact_score),
                change.description.clone(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&["change", "column", "impact", "description"], &rows)
}

pub fn render_change_records(records: &[SchemaChangeRecord]) -> String {
    let rows = records
        .iter()
        .map(|record| {
            vec![
                format!("{} -> {}", record.version_from, record.version_to),
                record.change_type.to_string(),
                optional(record.column_name.as_deref()),
                format!("{:.2}", record.impact_score),
                record.description.clone(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&["versions", "change", "column", "impact", "description"], &rows)
}

pub fn render_history(versions: &[&TableSchema]) -> String {
    let rows = versions
        .iter()
        .map(|schema| {
            vec![
                schema.version.clone(),
                schema.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                schema.columns.len().to_string(),
                schema.row_count.to_string(),
                schema.checksum.chars().take(12).collect(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&["version", "created_at", "columns", "rows", "checksum"], &rows)
}

pub fn render_drift(drift: &DriftReport, suggestions: &MigrationSuggestions) -> String {
    let mut output = format!(
        "Drift {} -> {}: {}\n",
        drift.previous_version.as_deref().unwrap_or("(none)"),
        drift.new_version,
        drift.summary
    );
    if !drift.changes.is_empty() {
        output.push_str(&render_changes(&drift.changes));
    }
    for (table, steps) in suggestions {
        let _ = writeln!(output, "\nSuggested migration for {table}:");
        for step in steps {
            let _ = writeln!(output, "  {step}");
        }
    }
    output
}

pub fn render_report(report: &AnalysisReport) -> String {
    let mut output = render_schema(&report.schema);
    output.push('\n');
    output.push_str(&render_drift(&report.drift, &report.migration_suggestions));
    let _ = writeln!(
        output,
        "\nCompleteness: {:.1}% over {} row(s) x {} column(s)",
        report.data_quality.completeness * 100.0,
        report.data_quality.row_count,
        report.data_quality.column_count
    );
    if !report.recommendations.is_empty() {
        let _ = writeln!(output, "\nRecommendations:");
        for recommendation in &report.recommendations {
            let _ = writeln!(output, "  - {recommendation}");
        }
    }
    for warning in &report.warnings {
        let _ = writeln!(output, "warning: {warning}");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_table_pads_columns_and_trims_trailing_space() {
        let rendered = render_table(
            &["name", "type"],
            &[
                vec!["id".to_string(), "integer".to_string()],
                vec!["email_address".to_string(), "".to_string()],
            ],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "name           type");
        assert_eq!(lines[1], "-------------  -------");
        assert_eq!(lines[2], "id             integer");
        assert_eq!(lines[3], "email_address");
    }

    #[test]
    fn sanitize_replaces_control_whitespace() {
        assert_eq!(sanitize_cell("a\nb\tc"), "a b c");
        assert!(matches!(sanitize_cell("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn display_width_ignores_ansi_sequences() {
        assert_eq!(display_width("\u{1b}[31mred\u{1b}[0m"), 3);
    }
}
