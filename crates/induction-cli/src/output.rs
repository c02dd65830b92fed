use clap::ValueEnum;
use colored::Colorize;
use induction_adapter::{Record, ResultSet, Value};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

const MAX_CELL_WIDTH: usize = 40;

fn cell(value: Option<&Value>) -> String {
    let text = match value {
        Some(value) => value.to_string(),
        None => String::new(),
    };
    if text.chars().count() > MAX_CELL_WIDTH {
        let mut clipped: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
        clipped.push('…');
        clipped
    } else {
        text
    }
}

/// Records as JSON objects keyed by field identifier, children nested
pub fn records_json(fields: &[String], records: &[Arc<dyn Record>]) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = records
        .iter()
        .map(|record| {
            let mut object = serde_json::Map::new();
            for field in fields {
                let value = record
                    .value_for_key(field)
                    .map(|v| serde_json::to_value(v).unwrap_or(serde_json::Value::Null))
                    .unwrap_or(serde_json::Value::Null);
                object.insert(field.clone(), value);
            }
            if let Some(children) = record.children() {
                object.insert("children".to_string(), records_json(fields, children));
            }
            serde_json::Value::Object(object)
        })
        .collect();
    serde_json::Value::Array(rows)
}

/// Aligned text table; child records are indented under their parent
pub fn render_table(fields: &[String], records: &[Arc<dyn Record>]) -> String {
    let mut lines: Vec<(usize, Vec<String>)> = Vec::new();
    collect_rows(fields, records, 0, &mut lines);

    let mut widths: Vec<usize> = fields.iter().map(|f| f.chars().count()).collect();
    for (depth, cells) in &lines {
        for (index, text) in cells.iter().enumerate() {
            let indent = if index == 0 { depth * 2 } else { 0 };
            widths[index] = widths[index].max(text.chars().count() + indent);
        }
    }

    let header: Vec<String> = fields
        .iter()
        .zip(&widths)
        .map(|(field, width)| format!("{:<width$}", field, width = width))
        .collect();
    let separator: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();

    let mut out = String::new();
    out.push_str(&header.join("  ").bold().to_string());
    out.push('\n');
    out.push_str(&separator.join("  "));
    out.push('\n');
    for (depth, cells) in lines {
        let row: Vec<String> = cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(index, (text, width))| {
                let text = if index == 0 {
                    format!("{}{}", "  ".repeat(depth), text)
                } else {
                    text.clone()
                };
                format!("{:<width$}", text, width = width)
            })
            .collect();
        out.push_str(row.join("  ").trim_end());
        out.push('\n');
    }
    out
}

fn collect_rows(
    fields: &[String],
    records: &[Arc<dyn Record>],
    depth: usize,
    lines: &mut Vec<(usize, Vec<String>)>,
) {
    for record in records {
        lines.push((
            depth,
            fields
                .iter()
                .map(|field| cell(record.value_for_key(field)))
                .collect(),
        ));
        if let Some(children) = record.children() {
            collect_rows(fields, children, depth + 1, lines);
        }
    }
}

/// Print a result set in the requested format
pub fn print_result_set(result_set: &dyn ResultSet, format: OutputFormat) -> anyhow::Result<()> {
    let fields = result_set.field_identifiers();
    let records = result_set.records()?;

    match format {
        OutputFormat::Json => {
            let types: Vec<serde_json::Value> = (0..result_set.number_of_fields())
                .map(|index| {
                    json!({
                        "identifier": result_set.identifier_for_field(index),
                        "type": result_set.value_type_for_field(index),
                    })
                })
                .collect();
            let document = json!({
                "fields": types,
                "records": records_json(&fields, &records),
            });
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        OutputFormat::Text => {
            print!("{}", render_table(&fields, &records));
            println!(
                "{} {}",
                "Records:".bright_white().bold(),
                result_set.number_of_records().to_string().bright_cyan()
            );
        }
    }
    Ok(())
}
