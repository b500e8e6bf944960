// 📜 Generation + Validation History
//
// Newest-first, size-capped logs of what the codec produced and checked.
// Validation history keeps running stats in step with its entries.

use crate::codec::{GeneratedNuban, ValidationOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_MAX_GENERATIONS: usize = 100;
pub const DEFAULT_MAX_VALIDATIONS: usize = 1000;

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: String,
    pub nuban: String,
    pub bank_code: String,
    pub bank_name: String,
    pub serial_number: String,
    pub check_digit: u8,
    pub generated_at: DateTime<Utc>,
}

impl From<&GeneratedNuban> for GenerationRecord {
    fn from(generated: &GeneratedNuban) -> Self {
        GenerationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            nuban: generated.nuban.to_string(),
            bank_code: generated.bank_code.to_string(),
            bank_name: generated.bank_name.clone(),
            serial_number: generated.serial_number.to_string(),
            check_digit: generated.check_digit.value(),
            generated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationType {
    Manual,
    Batch,
    Api,
}

impl ValidationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationType::Manual => "manual",
            ValidationType::Batch => "batch",
            ValidationType::Api => "api",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(ValidationType::Manual),
            "batch" => Some(ValidationType::Batch),
            "api" => Some(ValidationType::Api),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: String,
    pub nuban: String,
    pub bank_code: Option<String>,
    pub bank_name: Option<String>,
    pub is_valid: bool,
    pub reason: String,
    pub validated_at: DateTime<Utc>,
    pub validation_type: ValidationType,
}

impl ValidationRecord {
    pub fn from_outcome(outcome: &ValidationOutcome, validation_type: ValidationType) -> Self {
        ValidationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            nuban: outcome.nuban.clone(),
            bank_code: outcome.bank_code.clone(),
            bank_name: outcome.bank_name.clone(),
            is_valid: outcome.is_valid,
            reason: outcome.reason.clone(),
            validated_at: Utc::now(),
            validation_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationStats {
    pub total_validations: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub last_validated_at: Option<DateTime<Utc>>,
}

impl ValidationStats {
    /// Share of valid results in 0.0..=1.0 (0.0 when empty)
    pub fn valid_rate(&self) -> f64 {
        if self.total_validations == 0 {
            0.0
        } else {
            self.valid_count as f64 / self.total_validations as f64
        }
    }
}

// ============================================================================
// GENERATION HISTORY
// ============================================================================

#[derive(Debug, Clone)]
pub struct GenerationHistory {
    entries: VecDeque<GenerationRecord>,
    max_entries: usize,
}

impl GenerationHistory {
    pub fn new(max_entries: usize) -> Self {
        GenerationHistory {
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Push to the front; the oldest entry falls off past the cap
    pub fn record(&mut self, record: GenerationRecord) {
        self.entries.push_front(record);
        self.entries.truncate(self.max_entries);
    }

    /// Place a record by `generated_at` (newest first) instead of at the front
    pub fn merge(&mut self, record: GenerationRecord) {
        let index = self
            .entries
            .iter()
            .position(|r| r.generated_at < record.generated_at)
            .unwrap_or(self.entries.len());
        self.entries.insert(index, record);
        self.entries.truncate(self.max_entries);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|r| r.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<GenerationRecord> {
        let index = self.entries.iter().position(|r| r.id == id)?;
        self.entries.remove(index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Newest first
    pub fn entries(&self) -> impl Iterator<Item = &GenerationRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for GenerationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_GENERATIONS)
    }
}

// ============================================================================
// VALIDATION HISTORY
// ============================================================================

#[derive(Debug, Clone)]
pub struct ValidationHistory {
    entries: VecDeque<ValidationRecord>,
    stats: ValidationStats,
    max_entries: usize,
}

impl ValidationHistory {
    pub fn new(max_entries: usize) -> Self {
        ValidationHistory {
            entries: VecDeque::new(),
            stats: ValidationStats::default(),
            max_entries: max_entries.max(1),
        }
    }

    /// Stats count every recorded validation, including ones later
    /// pushed out by the cap.
    pub fn record(&mut self, record: ValidationRecord) {
        self.count(&record);
        self.entries.push_front(record);
        self.entries.truncate(self.max_entries);
    }

    /// Place a record by `validated_at` (newest first) instead of at the front
    pub fn merge(&mut self, record: ValidationRecord) {
        self.count(&record);
        let index = self
            .entries
            .iter()
            .position(|r| r.validated_at < record.validated_at)
            .unwrap_or(self.entries.len());
        self.entries.insert(index, record);
        self.entries.truncate(self.max_entries);
    }

    fn count(&mut self, record: &ValidationRecord) {
        self.stats.total_validations += 1;
        if record.is_valid {
            self.stats.valid_count += 1;
        } else {
            self.stats.invalid_count += 1;
        }
        // never moves backwards
        self.stats.last_validated_at = match self.stats.last_validated_at {
            Some(last) if last >= record.validated_at => Some(last),
            _ => Some(record.validated_at),
        };
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|r| r.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<ValidationRecord> {
        let index = self.entries.iter().position(|r| r.id == id)?;
        let removed = self.entries.remove(index)?;

        self.stats.total_validations = self.stats.total_validations.saturating_sub(1);
        if removed.is_valid {
            self.stats.valid_count = self.stats.valid_count.saturating_sub(1);
        } else {
            self.stats.invalid_count = self.stats.invalid_count.saturating_sub(1);
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = ValidationStats::default();
    }

    pub fn stats(&self) -> &ValidationStats {
        &self.stats
    }

    /// Newest first
    pub fn entries(&self) -> impl Iterator<Item = &ValidationRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ValidationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VALIDATIONS)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, BankCode, FixedSerials, SerialNumber};
    use crate::entities::bank::BankDirectory;

    fn validation(is_valid: bool) -> ValidationRecord {
        ValidationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            nuban: "0441234569".to_string(),
            bank_code: Some("044".to_string()),
            bank_name: Some("Access Bank".to_string()),
            is_valid,
            reason: String::new(),
            validated_at: Utc::now(),
            validation_type: ValidationType::Manual,
        }
    }

    #[test]
    fn test_generation_record_from_codec() {
        let directory = BankDirectory::nigerian_banks();
        let mut source = FixedSerials::new(vec![SerialNumber::parse("123456").unwrap()]);
        let generated =
            codec::generate(&BankCode::parse("044").unwrap(), &directory, &mut source).unwrap();

        let record = GenerationRecord::from(&generated);
        assert_eq!(record.nuban, "0441234569");
        assert_eq!(record.serial_number, "123456");
        assert_eq!(record.check_digit, 9);
        assert!(!record.id.is_empty());
    }

    #[test]
    fn test_generation_history_is_newest_first_and_capped() {
        let directory = BankDirectory::nigerian_banks();
        let code = BankCode::parse("058").unwrap();
        let mut source = codec::SeededSerials::new(3);
        let mut history = GenerationHistory::new(3);

        let mut ids = Vec::new();
        for _ in 0..5 {
            let generated = codec::generate(&code, &directory, &mut source).unwrap();
            let record = GenerationRecord::from(&generated);
            ids.push(record.id.clone());
            history.record(record);
        }

        assert_eq!(history.len(), 3);
        let kept: Vec<&str> = history.entries().map(|r| r.id.as_str()).collect();
        assert_eq!(kept, vec![ids[4].as_str(), ids[3].as_str(), ids[2].as_str()]);

        assert!(history.remove(&ids[3]).is_some());
        assert!(history.remove(&ids[0]).is_none());
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_validation_stats_track_records() {
        let mut history = ValidationHistory::default();
        let ok = validation(true);
        let ok_id = ok.id.clone();

        history.record(ok);
        history.record(validation(false));
        history.record(validation(false));

        let stats = history.stats();
        assert_eq!(stats.total_validations, 3);
        assert_eq!(stats.valid_count, 1);
        assert_eq!(stats.invalid_count, 2);
        assert!(stats.last_validated_at.is_some());
        assert!((stats.valid_rate() - 1.0 / 3.0).abs() < 1e-9);

        history.remove(&ok_id).unwrap();
        assert_eq!(history.stats().total_validations, 2);
        assert_eq!(history.stats().valid_count, 0);

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.stats(), &ValidationStats::default());
    }

    #[test]
    fn test_validation_history_cap() {
        let mut history = ValidationHistory::new(2);
        for _ in 0..4 {
            history.record(validation(true));
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.stats().total_validations, 4);
    }

    #[test]
    fn test_merge_keeps_newest_first() {
        let now = Utc::now();
        let at = |secs: i64| {
            let mut record = validation(true);
            record.validated_at = now - chrono::Duration::seconds(secs);
            record
        };

        let mut history = ValidationHistory::new(3);
        history.record(at(10));
        history.record(at(0));
        history.merge(at(5));
        history.merge(at(20));

        let times: Vec<DateTime<Utc>> = history.entries().map(|r| r.validated_at).collect();
        assert_eq!(
            times,
            vec![
                now,
                now - chrono::Duration::seconds(5),
                now - chrono::Duration::seconds(10),
            ]
        );
        assert_eq!(history.stats().total_validations, 4);
        assert_eq!(history.stats().last_validated_at, Some(now));
    }

    #[test]
    fn test_last_validated_at_never_moves_backwards() {
        let mut history = ValidationHistory::default();
        let newer = validation(true);
        let mut older = validation(false);
        older.validated_at = newer.validated_at - chrono::Duration::minutes(1);
        let latest = newer.validated_at;

        history.record(newer);
        history.record(older);
        assert_eq!(history.stats().last_validated_at, Some(latest));
    }

    #[test]
    fn test_generation_merge_orders_by_time() {
        let directory = BankDirectory::nigerian_banks();
        let code = BankCode::parse("044").unwrap();
        let mut source = codec::SeededSerials::new(5);
        let mut make = |age: i64| {
            let generated = codec::generate(&code, &directory, &mut source).unwrap();
            let mut record = GenerationRecord::from(&generated);
            record.generated_at = record.generated_at - chrono::Duration::seconds(age);
            record
        };

        let mut history = GenerationHistory::default();
        let newest = make(0);
        let middle = make(30);
        let oldest = make(60);
        let (newest_id, middle_id, oldest_id) =
            (newest.id.clone(), middle.id.clone(), oldest.id.clone());

        history.record(newest);
        history.merge(oldest);
        history.merge(middle);

        let ids: Vec<&str> = history.entries().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![newest_id.as_str(), middle_id.as_str(), oldest_id.as_str()]);
        assert!(history.contains(&middle_id));
    }

    #[test]
    fn test_record_from_outcome() {
        let directory = BankDirectory::nigerian_banks();
        let outcome = codec::validate("044 123 4568", None, &directory);
        let record = ValidationRecord::from_outcome(&outcome, ValidationType::Batch);

        assert_eq!(record.nuban, "0441234568");
        assert!(!record.is_valid);
        assert_eq!(record.reason, outcome.reason);
        assert_eq!(record.validation_type.as_str(), "batch");
        assert_eq!(ValidationType::parse("api"), Some(ValidationType::Api));
    }
}
