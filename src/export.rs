// 📤 Export / Import
//
// JSON snapshots carry a SHA-256 checksum of their payload so a tampered
// or truncated file is rejected on import. CSV export is one-way.

use crate::history::{GenerationHistory, GenerationRecord, ValidationHistory, ValidationRecord};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }
}

/// `nuban-export-YYYY-MM-DD.<ext>`
pub fn default_export_filename(format: ExportFormat, date: NaiveDate) -> String {
    format!("nuban-export-{}.{}", date.format("%Y-%m-%d"), format.extension())
}

// ============================================================================
// JSON SNAPSHOT
// ============================================================================

/// Everything needed to restore both histories
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub generations: Vec<GenerationRecord>,
    pub validations: Vec<ValidationRecord>,
}

impl Snapshot {
    pub fn capture(generations: &GenerationHistory, validations: &ValidationHistory) -> Self {
        Snapshot {
            generations: generations.entries().cloned().collect(),
            validations: validations.entries().cloned().collect(),
        }
    }
}

/// On-disk wrapper around a snapshot
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    data: Snapshot,
    version: u32,
    timestamp: DateTime<Utc>,
    checksum: String,
}

fn checksum(snapshot: &Snapshot) -> Result<String> {
    let canonical = serde_json::to_vec(snapshot)?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}

pub fn export_json(snapshot: &Snapshot) -> Result<String> {
    let envelope = Envelope {
        checksum: checksum(snapshot)?,
        data: snapshot.clone(),
        version: SNAPSHOT_VERSION,
        timestamp: Utc::now(),
    };
    serde_json::to_string_pretty(&envelope).context("Failed to serialize snapshot")
}

/// Parse and verify an exported snapshot
pub fn import_json(text: &str) -> Result<Snapshot> {
    let envelope: Envelope = serde_json::from_str(text).context("Not a NUBAN export file")?;

    if envelope.version != SNAPSHOT_VERSION {
        bail!(
            "Unsupported export version {} (expected {})",
            envelope.version,
            SNAPSHOT_VERSION
        );
    }

    let actual = checksum(&envelope.data)?;
    if actual != envelope.checksum {
        bail!("Checksum mismatch: export file is corrupted or was edited");
    }

    Ok(envelope.data)
}

// ============================================================================
// CSV
// ============================================================================

const CSV_HEADERS: [&str; 7] = [
    "NUBAN",
    "Bank Code",
    "Bank Name",
    "Serial Number",
    "Check Digit",
    "Generated At",
    "Status",
];

/// Generation rows first, then validation rows
pub fn export_csv<W: Write>(
    generations: &GenerationHistory,
    validations: &ValidationHistory,
    writer: W,
) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);

    wtr.write_record(CSV_HEADERS)?;

    for record in generations.entries() {
        let check_digit = record.check_digit.to_string();
        let generated_at = record.generated_at.to_rfc3339();
        wtr.write_record([
            record.nuban.as_str(),
            record.bank_code.as_str(),
            record.bank_name.as_str(),
            record.serial_number.as_str(),
            check_digit.as_str(),
            generated_at.as_str(),
            "Generated",
        ])?;
    }

    for record in validations.entries() {
        let validated_at = record.validated_at.to_rfc3339();
        wtr.write_record([
            record.nuban.as_str(),
            record.bank_code.as_deref().unwrap_or("N/A"),
            record.bank_name.as_deref().unwrap_or("N/A"),
            "N/A",
            "N/A",
            validated_at.as_str(),
            if record.is_valid { "Valid" } else { "Invalid" },
        ])?;
    }

    wtr.flush().context("Failed to write CSV export")?;
    Ok(())
}

pub fn export_csv_string(generations: &GenerationHistory, validations: &ValidationHistory) -> Result<String> {
    let mut buffer = Vec::new();
    export_csv(generations, validations, &mut buffer)?;
    String::from_utf8(buffer).context("CSV export produced invalid UTF-8")
}

// ============================================================================
// TESTS
// ============================================================================
