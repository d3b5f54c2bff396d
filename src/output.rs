use std::io::{self, Write};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::Value;

use crate::app::{FetchSummary, ProgressEvent, ProgressSink};
use crate::domain::MetadataRecord;
use crate::error::KiraError;
use crate::fs_util::write_atomic;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub fn write_json(path: &Path, records: &[MetadataRecord]) -> Result<(), KiraError> {
    let mut bytes = serde_json::to_vec_pretty(records)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

pub fn write_csv(path: &Path, records: &[MetadataRecord]) -> Result<(), KiraError> {
    let bytes = records_to_csv(records)?;
    write_atomic(path, &bytes)
}

pub fn records_to_csv(records: &[MetadataRecord]) -> Result<Vec<u8>, KiraError> {
    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        for field in record.keys() {
            if !columns.contains(&field.as_str()) {
                columns.push(field);
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    if !columns.is_empty() {
        writer
            .write_record(&columns)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    }
    for (row, record) in records.iter().enumerate() {
        let cells = columns
            .iter()
            .map(|column| cell(row, column, record.get(*column)))
            .collect::<Result<Vec<_>, KiraError>>()?;
        writer
            .write_record(&cells)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|err| KiraError::Filesystem(err.to_string()))
}

fn cell(row: usize, column: &str, value: Option<&Value>) -> Result<String, KiraError> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        Some(Value::Bool(flag)) => Ok(flag.to_string()),
        Some(Value::Array(_) | Value::Object(_)) => Err(KiraError::CsvSchema(format!(
            "record {row} field {column:?} holds a nested value"
        ))),
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &FetchSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, event: ProgressEvent) {
        tracing::info!(
            completed = event.completed,
            total = event.total,
            elapsed_secs = event.elapsed.as_secs_f64(),
            "{}",
            event.message
        );
    }
}

pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta}) {msg}",
        ) {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar }
    }

    pub fn finish(&self, summary: &FetchSummary) {
        self.bar.finish_with_message(format!(
            "{} records, {} failed",
            summary.records,
            summary.failures.len()
        ));
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn event(&self, event: ProgressEvent) {
        self.bar.set_length(event.total as u64);
        self.bar.set_position(event.completed as u64);
        self.bar
            .set_message(format!("{} ({:.1}s)", event.message, event.elapsed.as_secs_f64()));
    }
}
