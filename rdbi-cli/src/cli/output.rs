// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Result formatting for the CLI

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rdbi::driver::RowSet;
use rdbi::{Row, SqlValue};

use super::commands::OutputFormat;

pub struct ResultFormatter;

impl ResultFormatter {
    pub fn format(rows: &RowSet, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::format_table(rows),
            OutputFormat::Json => Self::format_json(rows),
            OutputFormat::Csv => Self::format_csv(rows),
        }
    }

    fn format_table(rows: &RowSet) -> String {
        if rows.columns.is_empty() {
            return "(no columns)".to_string();
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(rows.columns.clone());

        for row in &rows.rows {
            table.add_row(row.iter().map(cell).collect::<Vec<_>>());
        }

        let noun = if rows.len() == 1 { "row" } else { "rows" };
        format!("{}\n({} {})", table, rows.len(), noun)
    }

    fn format_json(rows: &RowSet) -> String {
        let records: Vec<serde_json::Value> = rows
            .rows
            .iter()
            .map(|values| Row::new(&rows.columns, values).to_json())
            .collect();
        serde_json::to_string_pretty(&records).unwrap_or_else(|e| format!("JSON error: {}", e))
    }

    fn format_csv(rows: &RowSet) -> String {
        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(
            rows.columns
                .iter()
                .map(|c| csv_field(c))
                .collect::<Vec<_>>()
                .join(","),
        );
        for row in &rows.rows {
            lines.push(
                row.iter()
                    .map(|v| csv_field(&cell(v)))
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }
        lines.join("\n")
    }

    /// Message printed for statements without a result set
    pub fn format_update(count: usize) -> String {
        let noun = if count == 1 { "row" } else { "rows" };
        format!("{} {} affected", count, noun)
    }
}

fn cell(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Text(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_field(text: &str) -> String {
    if text.contains(&[',', '"', '\n'][..]) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}
