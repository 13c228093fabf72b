//! Query results export (CSV / JSON / text table)
//!
//! Pure serialization functions, no filesystem I/O. The caller writes the
//! returned string wherever it wants.

use crate::db::types::{CellValue, QueryResults};
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

/// Longest cell rendered in a text table before truncation
const MAX_CELL_WIDTH: usize = 60;

/// Export format selector
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Aligned plain-text table
    #[default]
    #[serde(alias = "text")]
    #[value(alias = "text")]
    Table,
    Csv,
    Json,
}

impl ExportFormat {
    /// File extension for this format (without leading dot)
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Table => "txt",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Serialize results in the requested format
pub fn render(results: &QueryResults, format: ExportFormat) -> String {
    match format {
        ExportFormat::Table => to_table(results),
        ExportFormat::Csv => to_csv(results),
        ExportFormat::Json => to_json(results),
    }
}

/// Serialize query results as RFC 4180 CSV.
pub fn to_csv(results: &QueryResults) -> String {
    let mut out = String::new();

    // Header row
    for (i, col) in results.columns.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        csv_escape_into(&mut out, &col.name);
    }
    out.push('\n');

    // Data rows
    for row in &results.rows {
        for (i, cell) in row.values.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let text = cell_to_export_string(cell);
            csv_escape_into(&mut out, &text);
        }
        out.push('\n');
    }

    out
}

/// Serialize query results as a JSON array of objects with typed values.
pub fn to_json(results: &QueryResults) -> String {
    let col_names: Vec<&str> = results.columns.iter().map(|c| c.name.as_str()).collect();

    let rows: Vec<serde_json::Value> = results
        .rows
        .iter()
        .map(|row| {
            let mut obj = serde_json::Map::new();
            for (i, cell) in row.values.iter().enumerate() {
                let key = col_names.get(i).copied().unwrap_or("?");
                obj.insert(key.to_string(), cell_to_json(cell));
            }
            serde_json::Value::Object(obj)
        })
        .collect();

    serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
}

/// Render results as an aligned text table with a row count footer.
///
/// Widths are measured in terminal columns, so wide (CJK) characters line up.
pub fn to_table(results: &QueryResults) -> String {
    let header: Vec<String> = results.columns.iter().map(|c| c.name.clone()).collect();
    let body: Vec<Vec<String>> = results
        .rows
        .iter()
        .map(|row| {
            row.values
                .iter()
                .map(|cell| cell.display_string(MAX_CELL_WIDTH).replace(['\n', '\r'], " "))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.width()).collect();
    for row in &body {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.width());
            }
        }
    }

    let mut out = String::new();
    push_table_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');
    for row in &body {
        push_table_row(&mut out, row, &widths);
    }
    out.push_str(&format!(
        "({} row{})\n",
        results.row_count,
        if results.row_count == 1 { "" } else { "s" }
    ));
    out
}

fn push_table_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{}{}", cell, " ".repeat(w.saturating_sub(cell.width()))))
        .collect();
    out.push_str(padded.join(" | ").trim_end());
    out.push('\n');
}

/// Full untruncated value string for CSV export (NULL → empty string).
fn cell_to_export_string(cell: &CellValue) -> String {
    match cell {
        CellValue::Null => String::new(),
        CellValue::Integer(i) => i.to_string(),
        CellValue::Float(f) => f.to_string(),
        CellValue::Text(s) => s.clone(),
        CellValue::Boolean(b) => b.to_string(),
        CellValue::Binary(b) => hex_encode(b),
        CellValue::DateTime(s) => s.clone(),
    }
}

/// Convert a CellValue to a serde_json::Value with type preservation.
fn cell_to_json(cell: &CellValue) -> serde_json::Value {
    match cell {
        CellValue::Null => serde_json::Value::Null,
        CellValue::Integer(i) => serde_json::json!(*i),
        CellValue::Float(f) => {
            if f.is_finite() {
                serde_json::json!(*f)
            } else {
                // NaN / Infinity aren't valid JSON numbers
                serde_json::Value::String(f.to_string())
            }
        }
        CellValue::Text(s) => serde_json::Value::String(s.clone()),
        CellValue::Boolean(b) => serde_json::Value::Bool(*b),
        CellValue::Binary(b) => serde_json::Value::String(hex_encode(b)),
        CellValue::DateTime(s) => serde_json::Value::String(s.clone()),
    }
}

/// Quote a field if it contains `,` `"` or a newline (RFC 4180).
fn csv_escape_into(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

/// Hex-encode binary data as a SQLite blob literal body (`X'DEADBEEF'`).
fn hex_encode(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
    format!("X'{}'", hex)
}
