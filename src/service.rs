// 🧭 NUBAN Service
//
// Facade used by the CLI and the REST server. Wires the pure codec to the
// bank directory, the in-memory histories and (optionally) SQLite.

use crate::batch::{self, BatchItem, BatchSummary};
use crate::codec::{
    self, BankCode, CheckDigit, CheckDigitObserver, GeneratedNuban, SerialNumber, SerialSource,
    ThreadRngSerials, ValidationOutcome,
};
use crate::config::AppConfig;
use crate::db;
use crate::entities::account::{
    AccountError, AccountRepository, AccountVerification, NubanAccount, OpenAccountRequest,
};
use crate::entities::bank::{Bank, BankDirectory};
use crate::export::Snapshot;
use crate::history::{
    GenerationHistory, GenerationRecord, ValidationHistory, ValidationRecord, ValidationStats,
    ValidationType,
};
use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Emits every weighted term of a check digit computation at trace level
#[derive(Debug, Default)]
pub struct TracingObserver {
    terms: usize,
}

impl CheckDigitObserver for TracingObserver {
    fn term(&mut self, position: usize, digit: u32, weight: u32) {
        self.terms += 1;
        tracing::trace!(position, digit, weight, product = digit * weight, "check digit term");
    }

    fn finished(&mut self, sum: u32, remainder: u32, check_digit: CheckDigit) {
        tracing::debug!(
            terms = self.terms,
            sum,
            remainder,
            check_digit = check_digit.value(),
            "check digit computed"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub generated: usize,
    pub banks: usize,
    #[serde(flatten)]
    pub validations: ValidationStats,
}

pub struct NubanService {
    directory: BankDirectory,
    generations: GenerationHistory,
    validations: ValidationHistory,
    accounts: AccountRepository,
    store: Option<Connection>,
    serials: Box<dyn SerialSource + Send>,
}

impl NubanService {
    /// In-memory service with default history limits
    pub fn new(directory: BankDirectory) -> Self {
        NubanService {
            directory,
            generations: GenerationHistory::default(),
            validations: ValidationHistory::default(),
            accounts: AccountRepository::new(),
            store: None,
            serials: Box::new(ThreadRngSerials),
        }
    }

    /// Build from config: directory, history limits and store
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let directory = config.bank_directory()?;
        let mut service = NubanService {
            generations: GenerationHistory::new(config.history.max_generations),
            validations: ValidationHistory::new(config.history.max_validations),
            ..NubanService::new(directory)
        };

        if let Some(path) = &config.storage.db_path {
            service = service.with_store(db::open_database(path)?)?;
        }
        Ok(service)
    }

    /// Open with a database file, loading persisted history
    pub fn open(directory: BankDirectory, path: &Path) -> Result<Self> {
        NubanService::new(directory).with_store(db::open_database(path)?)
    }

    /// Attach a store. Histories are replaced by what it holds.
    pub fn with_store(mut self, conn: Connection) -> Result<Self> {
        db::setup_database(&conn)?;

        let generations = db::load_generations(&conn, self.generations.capacity())?;
        let validations = db::load_validations(&conn, self.validations.capacity())?;

        self.generations.clear();
        self.validations.clear();
        // stored newest first; replay oldest first so order survives
        for record in generations.into_iter().rev() {
            self.generations.record(record);
        }
        for record in validations.into_iter().rev() {
            self.validations.record(record);
        }

        tracing::info!(
            generations = self.generations.len(),
            validations = self.validations.len(),
            "history loaded from store"
        );
        self.store = Some(conn);
        Ok(self)
    }

    pub fn with_serials<S: SerialSource + Send + 'static>(mut self, serials: S) -> Self {
        self.serials = Box::new(serials);
        self
    }

    pub fn directory(&self) -> &BankDirectory {
        &self.directory
    }

    pub fn banks(&self) -> Vec<&Bank> {
        self.directory.all()
    }

    pub fn generations(&self) -> &GenerationHistory {
        &self.generations
    }

    pub fn validations(&self) -> &ValidationHistory {
        &self.validations
    }

    // ------------------------------------------------------------------------
    // Codec operations
    // ------------------------------------------------------------------------

    pub fn generate(&mut self, bank_code: &str) -> Result<GeneratedNuban> {
        let code = BankCode::parse(bank_code)?;
        let generated = codec::generate(&code, &self.directory, self.serials.as_mut())?;

        let record = GenerationRecord::from(&generated);
        if let Some(conn) = &self.store {
            db::insert_generation(conn, &record)?;
        }
        self.generations.record(record);

        tracing::info!(
            nuban = %generated.nuban,
            bank = %generated.bank_name,
            "generated NUBAN"
        );
        Ok(generated)
    }

    /// Check digit with every step traced
    pub fn check_digit(&self, bank_code: &str, serial: &str) -> Result<CheckDigit> {
        let code = BankCode::parse(bank_code)?;
        let serial = SerialNumber::parse(serial)?;
        Ok(codec::check_digit_observed(
            &code,
            &serial,
            &mut TracingObserver::default(),
        ))
    }

    pub fn validate(
        &mut self,
        raw: &str,
        expected_bank_code: Option<&str>,
        validation_type: ValidationType,
    ) -> Result<ValidationOutcome> {
        let outcome = codec::validate(raw, expected_bank_code, &self.directory);
        self.record_validation(&outcome, validation_type)?;

        tracing::info!(
            nuban = %outcome.nuban,
            valid = outcome.is_valid,
            verdict = outcome.verdict.label(),
            "validated NUBAN"
        );
        Ok(outcome)
    }

    pub fn batch_validate(
        &mut self,
        items: &[BatchItem],
    ) -> Result<(Vec<ValidationOutcome>, BatchSummary)> {
        let outcomes = batch::validate_batch(items, &self.directory);
        for outcome in &outcomes {
            self.record_validation(outcome, ValidationType::Batch)?;
        }

        let summary = BatchSummary::from_outcomes(&outcomes);
        tracing::info!(
            total = summary.total,
            valid = summary.valid,
            invalid = summary.invalid,
            "batch validated"
        );
        Ok((outcomes, summary))
    }

    fn record_validation(
        &mut self,
        outcome: &ValidationOutcome,
        validation_type: ValidationType,
    ) -> Result<()> {
        let record = ValidationRecord::from_outcome(outcome, validation_type);
        if let Some(conn) = &self.store {
            db::insert_validation(conn, &record)?;
        }
        self.validations.record(record);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Accounts (in memory only)
    // ------------------------------------------------------------------------

    pub fn open_account(&mut self, request: OpenAccountRequest) -> Result<NubanAccount, AccountError> {
        let account = self
            .accounts
            .open_account(request, &self.directory, self.serials.as_mut())?;
        tracing::info!(
            id = %account.id,
            account_number = %account.account_number,
            "opened account"
        );
        Ok(account)
    }

    pub fn verify_account(&self, account_number: &str, bank_code: &str) -> AccountVerification {
        self.accounts.verify(account_number, bank_code, &self.directory)
    }

    pub fn accounts(&self) -> &AccountRepository {
        &self.accounts
    }

    pub fn accounts_mut(&mut self) -> &mut AccountRepository {
        &mut self.accounts
    }

    // ------------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------------

    pub fn remove_validation(&mut self, id: &str) -> Result<bool> {
        let removed = self.validations.remove(id).is_some();
        if let Some(conn) = &self.store {
            db::delete_validation(conn, id)?;
        }
        Ok(removed)
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.generations.clear();
        self.validations.clear();
        if let Some(conn) = &self.store {
            db::clear_history(conn)?;
        }
        tracing::info!("history cleared");
        Ok(())
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            generated: self.generations.len(),
            banks: self.directory.len(),
            validations: self.validations.stats().clone(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.generations, &self.validations)
    }

    /// Merge an imported snapshot into the histories (and the store).
    /// Records land in timestamp order; ids already present are skipped.
    /// Returns how many records were imported.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<usize> {
        let mut imported = 0;

        for record in snapshot.generations {
            if self.generations.contains(&record.id) {
                continue;
            }
            if let Some(conn) = &self.store {
                db::insert_generation(conn, &record).context("Failed to import generation")?;
            }
            self.generations.merge(record);
            imported += 1;
        }

        for record in snapshot.validations {
            if self.validations.contains(&record.id) {
                continue;
            }
            if let Some(conn) = &self.store {
                db::insert_validation(conn, &record).context("Failed to import validation")?;
            }
            self.validations.merge(record);
            imported += 1;
        }

        tracing::info!(imported, "snapshot restored");
        Ok(imported)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecError, FixedSerials, SeededSerials};

    fn service() -> NubanService {
        NubanService::new(BankDirectory::nigerian_banks())
            .with_serials(FixedSerials::new(vec![SerialNumber::parse("123456").unwrap()]))
    }

    #[test]
    fn test_generate_records_history() {
        let mut service = service();
        let generated = service.generate("044").unwrap();

        assert_eq!(generated.nuban.to_string(), "0441234569");
        assert_eq!(generated.bank_name, "Access Bank");
        assert_eq!(service.generations().len(), 1);
        assert_eq!(service.stats().generated, 1);
    }

    #[test]
    fn test_generate_errors_keep_their_kind() {
        let mut service = service();

        let err = service.generate("999").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CodecError>(),
            Some(CodecError::UnknownBank(code)) if code == "999"
        ));

        let err = service.generate("44").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CodecError>(),
            Some(CodecError::InvalidInput { .. })
        ));
        assert!(service.generations().is_empty());
    }

    #[test]
    fn test_validate_and_stats() {
        let mut service = service();
        let ok = service.validate("044-123-4569", Some("044"), ValidationType::Manual).unwrap();
        let bad = service.validate("0441234568", None, ValidationType::Api).unwrap();

        assert!(ok.is_valid);
        assert_eq!(ok.reason, "Valid NUBAN for Access Bank");
        assert!(!bad.is_valid);

        let stats = service.stats();
        assert_eq!(stats.validations.total_validations, 2);
        assert_eq!(stats.validations.valid_count, 1);
        assert_eq!(stats.banks, 23);

        let id = service.validations().entries().next().unwrap().id.clone();
        assert!(service.remove_validation(&id).unwrap());
        assert!(!service.remove_validation(&id).unwrap());
        assert_eq!(service.stats().validations.total_validations, 1);
    }

    #[test]
    fn test_batch_validate_records_as_batch() {
        let mut service = service();
        let items = vec![BatchItem::new("0441234569", None), BatchItem::new("1", None)];

        let (outcomes, summary) = service.batch_validate(&items).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(summary.valid, 1);
        assert!(service
            .validations()
            .entries()
            .all(|r| r.validation_type == ValidationType::Batch));
    }

    #[test]
    fn test_check_digit() {
        let service = service();
        assert_eq!(service.check_digit("044", "123456").unwrap().value(), 9);
        assert!(service.check_digit("044", "12345").is_err());
    }

    #[test]
    fn test_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nuban.db");

        {
            let mut service = NubanService::open(BankDirectory::nigerian_banks(), &path)
                .unwrap()
                .with_serials(SeededSerials::new(11));
            service.generate("058").unwrap();
            service.generate("011").unwrap();
            service.validate("0441234569", None, ValidationType::Manual).unwrap();
        }

        let service = NubanService::open(BankDirectory::nigerian_banks(), &path).unwrap();
        assert_eq!(service.generations().len(), 2);
        assert_eq!(service.generations().entries().next().unwrap().bank_code, "011");
        assert_eq!(service.validations().len(), 1);
        assert_eq!(service.stats().validations.valid_count, 1);
    }

    #[test]
    fn test_clear_history_clears_store() {
        let conn = Connection::open_in_memory().unwrap();
        let mut service = service().with_store(conn).unwrap();
        service.generate("044").unwrap();
        service.validate("0441234569", None, ValidationType::Manual).unwrap();

        service.clear_history().unwrap();
        assert!(service.generations().is_empty());
        assert_eq!(service.stats().validations, ValidationStats::default());

        let conn = service.store.as_ref().unwrap();
        assert_eq!(db::count_rows(conn, "generated_nubans").unwrap(), 0);
        assert_eq!(db::count_rows(conn, "validations").unwrap(), 0);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut source = service();
        source.generate("044").unwrap();
        source.validate("0441234569", None, ValidationType::Manual).unwrap();
        let snapshot = source.snapshot();

        let mut target = NubanService::new(BankDirectory::nigerian_banks());
        assert_eq!(target.restore(snapshot.clone()).unwrap(), 2);
        assert_eq!(target.snapshot(), snapshot);

        // same ids again are skipped
        assert_eq!(target.restore(snapshot).unwrap(), 0);
    }

    #[test]
    fn test_accounts() {
        let mut service = service();
        let request = OpenAccountRequest::new(
            "044",
            "Ada Obi",
            crate::entities::account::AccountType::Savings,
        );
        let account = service.open_account(request).unwrap();
        assert_eq!(account.account_number, "0441234569");

        let verification = service.verify_account("0441234569", "044");
        assert!(verification.is_valid);
        assert_eq!(verification.account_name.as_deref(), Some("Ada Obi"));

        let missing = service.verify_account("0580000000", "058");
        assert!(!missing.is_valid);

        assert!(service.accounts_mut().delete(&account.id));
        assert_eq!(service.accounts().count(), 0);
    }

    #[test]
    fn test_restore_older_snapshot_keeps_order() {
        let mut earlier = service();
        earlier.generate("044").unwrap();
        earlier.validate("0441234569", None, ValidationType::Manual).unwrap();
        let mut snapshot = earlier.snapshot();
        for record in &mut snapshot.generations {
            record.generated_at = record.generated_at - chrono::Duration::minutes(5);
        }
        for record in &mut snapshot.validations {
            record.validated_at = record.validated_at - chrono::Duration::minutes(5);
        }

        let mut later = service();
        later.generate("044").unwrap();
        later.validate("0441234568", None, ValidationType::Manual).unwrap();
        let before = later.stats().validations.last_validated_at;
        let newest_generation = later.generations().entries().next().unwrap().id.clone();
        let newest_validation = later.validations().entries().next().unwrap().id.clone();

        assert_eq!(later.restore(snapshot).unwrap(), 2);

        assert_eq!(later.stats().validations.last_validated_at, before);
        assert_eq!(later.generations().entries().next().unwrap().id, newest_generation);
        assert_eq!(later.validations().entries().next().unwrap().id, newest_validation);

        let times: Vec<_> = later.validations().entries().map(|r| r.validated_at).collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
        let times: Vec<_> = later.generations().entries().map(|r| r.generated_at).collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_from_config() {
        let config = AppConfig::load_str("[history]\nmax_generations = 1").unwrap();
        let mut service = NubanService::from_config(&config)
            .unwrap()
            .with_serials(SeededSerials::new(1));
        service.generate("044").unwrap();
        service.generate("044").unwrap();
        assert_eq!(service.generations().len(), 1);
    }
}
