use chrono::NaiveDate;
use thiserror::Error;

use crate::entry::LogEntry;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to encode JSON export: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to encode CSV export: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV export is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("Failed to finish CSV export: {0}")]
    Flush(std::io::Error),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

pub fn export_filename(date: NaiveDate, format: ExportFormat) -> String {
    format!("condition-logs-{}.{}", date.format("%Y-%m-%d"), format.extension())
}

/// Pretty-printed JSON of the full collection.
pub fn export_json(entries: &[LogEntry]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(entries)?)
}

pub fn parse_export(text: &str) -> Result<Vec<LogEntry>, ExportError> {
    Ok(serde_json::from_str(text)?)
}

const CSV_HEADER: [&str; 8] = [
    "id",
    "condition_id",
    "timestamp",
    "date",
    "severity",
    "prostrating",
    "impact",
    "notes",
];

/// Flat one-row-per-entry CSV for spreadsheets.
pub fn export_csv(entries: &[LogEntry]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for entry in entries {
        let severity = entry.severity().map(|value| value.to_string()).unwrap_or_default();
        writer.write_record([
            entry.id.as_str(),
            entry.condition_id.as_str(),
            entry.timestamp.to_rfc3339().as_str(),
            entry.occurrence_date().format("%Y-%m-%d").to_string().as_str(),
            severity.as_str(),
            entry.text("prostrating").unwrap_or(""),
            entry.text("impact").unwrap_or(""),
            entry.notes().unwrap_or(""),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Flush(err.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn export(entries: &[LogEntry], format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Json => export_json(entries),
        ExportFormat::Csv => export_csv(entries),
    }
}
