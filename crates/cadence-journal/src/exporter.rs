//! Export rotation logs to various formats

use crate::{Error, Result};
use cadence_core::RotationRecord;
use serde::Serialize;
use std::io::Write;

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// RON format (Rust Object Notation)
    Ron,
    /// JSON format (requires the `serde_json` feature)
    Json,
    /// CSV format, one row per record
    Csv,
    /// Human-readable text format
    Text,
}

/// Exporter over a rotation log
pub struct Exporter<'a> {
    log: &'a [RotationRecord],
}

impl<'a> Exporter<'a> {
    /// Create a new exporter
    pub fn new(log: &'a [RotationRecord]) -> Self {
        Self { log }
    }

    /// Export to a string in the specified format
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Ron => self.to_ron(),
            ExportFormat::Json => self.to_json(),
            ExportFormat::Csv => Ok(self.to_csv()),
            ExportFormat::Text => Ok(self.to_text()),
        }
    }

    /// Export to a writer
    pub fn export_to<W: Write>(&self, writer: &mut W, format: ExportFormat) -> Result<()> {
        let content = self.export(format)?;
        writer
            .write_all(content.as_bytes())
            .map_err(|e| Error::Export(e.to_string()))
    }

    /// Export to RON format
    pub fn to_ron(&self) -> Result<String> {
        let export = ExportData::from_log(self.log);
        ron::ser::to_string_pretty(&export, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Export to JSON format
    #[cfg(feature = "serde_json")]
    pub fn to_json(&self) -> Result<String> {
        let export = ExportData::from_log(self.log);
        serde_json::to_string_pretty(&export).map_err(|e| Error::Serialization(e.to_string()))
    }

    #[cfg(not(feature = "serde_json"))]
    pub fn to_json(&self) -> Result<String> {
        Err(Error::Export(
            "JSON export requires the 'serde_json' feature".to_string(),
        ))
    }

    /// Export to CSV format
    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("step,op,counter,time,consumed\n");

        for (step, record) in self.log.iter().enumerate() {
            let consumed: Vec<String> = record
                .consumed
                .iter()
                .map(|(id, amount)| format!("{id}:{amount}"))
                .collect();
            let consumed = consumed.join(";").replace('"', "\"\"");
            output.push_str(&format!(
                "{},{},{},{},\"{}\"\n",
                step, record.op, record.counter, record.time, consumed
            ));
        }
        output
    }

    /// Export to human-readable text format
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        output.push_str("=== Rotation Export ===\n\n");
        output.push_str(&format!("Records: {}\n", self.log.len()));
        if let Some(last) = self.log.last() {
            output.push_str(&format!("End time: {:.3}\n", last.time));
        }
        output.push_str("\n=== Records ===\n\n");

        for (step, record) in self.log.iter().enumerate() {
            output.push_str(&format!(
                "  #{} t={:.3} {} (x{})\n",
                step, record.time, record.op, record.counter
            ));
            if !record.consumed.is_empty() {
                let consumed: Vec<String> = record
                    .consumed
                    .iter()
                    .map(|(id, amount)| format!("{id}={amount}"))
                    .collect();
                output.push_str(&format!("      consumed: {}\n", consumed.join(", ")));
            }
        }
        output
    }
}

/// Data structure for a full log export
#[derive(Debug, Clone, Serialize)]
struct ExportData<'a> {
    version: u32,
    records: usize,
    end_time: Option<f64>,
    log: &'a [RotationRecord],
}

impl<'a> ExportData<'a> {
    fn from_log(log: &'a [RotationRecord]) -> Self {
        Self {
            version: 1,
            records: log.len(),
            end_time: log.last().map(|r| r.time),
            log,
        }
    }
}
