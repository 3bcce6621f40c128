use serde_json::Value;
use sfenv_core::query::QueryOutput;
use sfenv_core::remote::{QueryError, QueryResponse, Record};
use tracing::{error, warn};

const MAX_COLUMN_WIDTH: usize = 40;

/// Prints query results to stdout and errors to the log.
pub struct ConsoleOutput {
    json: bool,
}

impl ConsoleOutput {
    pub fn new(json: bool) -> Self {
        Self { json }
    }
}

impl QueryOutput for ConsoleOutput {
    fn rows(&mut self, response: &QueryResponse) {
        if self.json {
            match serde_json::to_string_pretty(response) {
                Ok(json) => println!("{}", json),
                Err(err) => error!("failed to encode query response: {err}"),
            }
            return;
        }

        for line in render_records(response) {
            println!("{}", line);
        }
        if !response.done {
            warn!(
                shown = response.records.len(),
                total_size = response.total_size,
                "remaining records were not fetched"
            );
        }
    }

    fn error(&mut self, err: &QueryError) {
        error!("account query failed: {err}");
    }
}

fn render_records(response: &QueryResponse) -> Vec<String> {
    let columns = response.columns();
    if columns.is_empty() {
        return vec![format!("No records ({} total).", response.total_size)];
    }

    let rows: Vec<Vec<String>> = response
        .records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| truncate(&cell(record, column), MAX_COLUMN_WIDTH))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            rows.iter()
                .map(|row| row[idx].chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_row = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{:<width$}", value, width = *width))
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end()
            .to_string()
    };

    let header: Vec<String> = columns.iter().map(|c| c.to_uppercase()).collect();
    let total_width = widths.iter().sum::<usize>() + widths.len().saturating_sub(1);

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_row(header.as_slice()));
    lines.push("-".repeat(total_width));
    lines.extend(rows.iter().map(|row| format_row(row.as_slice())));
    lines
}

fn cell(record: &Record, column: &str) -> String {
    match record.get(column) {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn truncate(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        return value.to_owned();
    }
    let mut collected: String = value.chars().take(max_len.saturating_sub(1)).collect();
    collected.push('…');
    collected
}
