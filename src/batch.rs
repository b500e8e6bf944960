// 📦 Batch Validation
//
// Each validation is independent, so large batches fan out over rayon.
// Results always come back in submission order.

use crate::codec::{self, ValidationOutcome};
use crate::entities::bank::BankLookup;
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Below this many items the batch runs sequentially
pub const PARALLEL_THRESHOLD: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub nuban: String,
    #[serde(default)]
    pub bank_code: Option<String>,
}

impl BatchItem {
    pub fn new(nuban: &str, bank_code: Option<&str>) -> Self {
        BatchItem {
            nuban: nuban.to_string(),
            bank_code: bank_code.map(str::to_string),
        }
    }
}

/// Validate every item; output[i] belongs to items[i]
pub fn validate_batch<L>(items: &[BatchItem], directory: &L) -> Vec<ValidationOutcome>
where
    L: BankLookup + Sync + ?Sized,
{
    let check = |item: &BatchItem| codec::validate(&item.nuban, item.bank_code.as_deref(), directory);

    if items.len() < PARALLEL_THRESHOLD {
        items.iter().map(check).collect()
    } else {
        // indexed par_iter + collect keeps input order
        items.par_iter().map(check).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[ValidationOutcome]) -> Self {
        let valid = outcomes.iter().filter(|o| o.is_valid).count();
        BatchSummary {
            total: outcomes.len(),
            valid,
            invalid: outcomes.len() - valid,
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Validated {} NUBANs. {} valid, {} invalid",
            self.total, self.valid, self.invalid
        )
    }
}

/// Read batch input.
///
/// Accepts a CSV with a `nuban` header (and optional `bank_code`), or a
/// plain list with one NUBAN per line. Blank lines are skipped.
pub fn read_batch_file(path: &Path) -> Result<Vec<BatchItem>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;
    parse_batch(&text)
}

pub fn parse_batch(text: &str) -> Result<Vec<BatchItem>> {
    let has_header = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.split(',').any(|h| h.trim().eq_ignore_ascii_case("nuban")))
        .unwrap_or(false);

    if !has_header {
        return Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| BatchItem::new(l, None))
            .collect());
    }

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut items = Vec::new();
    for result in rdr.deserialize() {
        let mut item: BatchItem = result.context("Failed to deserialize batch row")?;
        item.bank_code = item.bank_code.filter(|c| !c.is_empty());
        if !item.nuban.is_empty() {
            items.push(item);
        }
    }
    Ok(items)
}

// ============================================================================
// TESTS
// ============================================================================
