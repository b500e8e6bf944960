// 💳 Account Entity + Account Repository
//
// Mock account store for demos and UI collaborators. Every account number
// is a NUBAN minted by the codec, so anything in here validates.
//
// The repository is an explicit owned collection: callers hold it and pass
// it around, nothing is global.

use crate::codec::{self, BankCode, CodecError, SerialSource};
use crate::entities::bank::BankLookup;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ACCOUNT TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Savings,
    Current,
    Fixed,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "savings",
            AccountType::Current => "current",
            AccountType::Fixed => "fixed",
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccountError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    #[error("account not found: {0}")]
    NotFound(String),

    #[error("no free account number for bank {0} after redraws")]
    DuplicateAccountNumber(String),
}

fn invalid(field: &'static str, message: &str) -> AccountError {
    AccountError::InvalidField {
        field,
        message: message.to_string(),
    }
}

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NubanAccount {
    /// Stable identity (UUID v4)
    pub id: String,

    /// 10-digit NUBAN
    pub account_number: String,

    pub account_name: String,
    pub bank_code: String,
    pub bank_name: String,
    pub sort_code: Option<String>,

    /// Bank Verification Number (11 digits)
    pub bvn: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,

    pub account_type: AccountType,
    pub balance: f64,
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`AccountRepository::open_account`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAccountRequest {
    pub bank_code: String,
    pub account_name: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub initial_balance: Option<f64>,
    #[serde(default)]
    pub bvn: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl OpenAccountRequest {
    pub fn new(bank_code: &str, account_name: &str, account_type: AccountType) -> Self {
        OpenAccountRequest {
            bank_code: bank_code.to_string(),
            account_name: account_name.to_string(),
            account_type,
            initial_balance: None,
            bvn: None,
            phone_number: None,
            email: None,
        }
    }

    fn check_fields(&self) -> Result<(), AccountError> {
        if self.account_name.trim().is_empty() {
            return Err(invalid("account_name", "must not be empty"));
        }
        if let Some(bvn) = &self.bvn {
            if !is_valid_bvn(bvn) {
                return Err(invalid("bvn", "must be exactly 11 digits"));
            }
        }
        if let Some(phone) = &self.phone_number {
            if !is_valid_nigerian_phone(phone) {
                return Err(invalid("phone_number", "not a Nigerian mobile number"));
            }
        }
        if let Some(email) = &self.email {
            if !is_valid_email(email) {
                return Err(invalid("email", "malformed address"));
            }
        }
        if let Some(balance) = self.initial_balance {
            if !balance.is_finite() || balance < 0.0 {
                return Err(invalid("initial_balance", "must be a non-negative amount"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// FIELD VALIDATORS
// ============================================================================

pub fn is_valid_bvn(bvn: &str) -> bool {
    bvn.len() == 11 && bvn.bytes().all(|b| b.is_ascii_digit())
}

/// `^(\+234|234|0)?[789]\d{9}$` with whitespace ignored
pub fn is_valid_nigerian_phone(phone: &str) -> bool {
    let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    let rest = compact
        .strip_prefix("+234")
        .or_else(|| compact.strip_prefix("234"))
        .or_else(|| compact.strip_prefix('0'))
        .unwrap_or(&compact);

    rest.len() == 10
        && rest.bytes().all(|b| b.is_ascii_digit())
        && matches!(rest.as_bytes()[0], b'7' | b'8' | b'9')
}

/// `^[^\s@]+@[^\s@]+\.[^\s@]+$`
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    // some '.' with at least one character on each side
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

// ============================================================================
// FILTERS + PAGINATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountFilters {
    pub bank_code: Option<String>,
    pub account_type: Option<AccountType>,
    pub min_balance: Option<f64>,
    pub max_balance: Option<f64>,
    /// Case-insensitive match on name, number, bank name, or email
    pub search_term: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl AccountFilters {
    pub fn matches(&self, account: &NubanAccount) -> bool {
        if let Some(code) = &self.bank_code {
            if &account.bank_code != code {
                return false;
            }
        }
        if let Some(kind) = self.account_type {
            if account.account_type != kind {
                return false;
            }
        }
        if let Some(min) = self.min_balance {
            if account.balance < min {
                return false;
            }
        }
        if let Some(max) = self.max_balance {
            if account.balance > max {
                return false;
            }
        }
        if let Some(term) = &self.search_term {
            let term = term.to_lowercase();
            let hit = account.account_name.to_lowercase().contains(&term)
                || account.account_number.contains(&term)
                || account.bank_name.to_lowercase().contains(&term)
                || account
                    .email
                    .as_ref()
                    .is_some_and(|e| e.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        if let Some(from) = self.created_from {
            if account.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.created_to {
            if account.created_at > to {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: usize,
    pub page_size: usize,
    pub total_count: usize,
    pub total_pages: usize,
}

/// Result of checking an account number against a bank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountVerification {
    pub is_valid: bool,
    pub account_name: Option<String>,
    pub bank_name: Option<String>,
    pub errors: Vec<String>,
}

// ============================================================================
// ACCOUNT REPOSITORY
// ============================================================================

/// Extra serial draws before opening an account gives up on a collision
const MAX_REDRAWS: usize = 8;

/// Owned collection of accounts, newest first.
#[derive(Debug, Clone, Default)]
pub struct AccountRepository {
    accounts: Vec<NubanAccount>,
}

impl AccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the request, mint a NUBAN for it, and store the account
    pub fn open_account<L, S>(
        &mut self,
        request: OpenAccountRequest,
        directory: &L,
        source: &mut S,
    ) -> Result<NubanAccount, AccountError>
    where
        L: BankLookup + ?Sized,
        S: SerialSource + ?Sized,
    {
        request.check_fields()?;

        let bank_code = BankCode::parse(&request.bank_code)?;
        let bank = directory
            .resolve(bank_code.as_str())
            .ok_or_else(|| CodecError::UnknownBank(request.bank_code.clone()))?;

        // Serial collisions inside one bank are possible; redraw a few times
        let mut generated = codec::generate(&bank_code, directory, source)?;
        for _ in 0..MAX_REDRAWS {
            if self.find_by_account_number(&generated.nuban.to_string()).is_none() {
                break;
            }
            generated = codec::generate(&bank_code, directory, source)?;
        }
        if self.find_by_account_number(&generated.nuban.to_string()).is_some() {
            return Err(AccountError::DuplicateAccountNumber(bank_code.to_string()));
        }

        let now = Utc::now();
        let account = NubanAccount {
            id: uuid::Uuid::new_v4().to_string(),
            account_number: generated.nuban.to_string(),
            account_name: request.account_name.trim().to_string(),
            bank_code: bank_code.to_string(),
            bank_name: bank.name.clone(),
            sort_code: bank.sort_code.clone(),
            bvn: request.bvn,
            phone_number: request.phone_number,
            email: request.email,
            account_type: request.account_type,
            balance: request.initial_balance.unwrap_or(0.0),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.accounts.insert(0, account.clone());
        Ok(account)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&NubanAccount> {
        self.accounts.iter().find(|a| a.id == id)
    }

    /// Lookup by NUBAN; formatting in `account_number` is ignored
    pub fn find_by_account_number(&self, account_number: &str) -> Option<&NubanAccount> {
        let cleaned = codec::clean(account_number);
        self.accounts.iter().find(|a| a.account_number == cleaned)
    }

    /// Filtered, 1-based page of accounts
    pub fn list(&self, filters: &AccountFilters, page: usize, page_size: usize) -> Page<NubanAccount> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let matching: Vec<&NubanAccount> =
            self.accounts.iter().filter(|a| filters.matches(a)).collect();

        let total_count = matching.len();
        let total_pages = total_count.div_ceil(page_size);
        let data = matching
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect();

        Page {
            data,
            current_page: page,
            page_size,
            total_count,
            total_pages,
        }
    }

    /// Apply `update_fn` to an account and bump `updated_at`
    pub fn update<F>(&mut self, id: &str, update_fn: F) -> Result<NubanAccount, AccountError>
    where
        F: FnOnce(&mut NubanAccount),
    {
        let account = self
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AccountError::NotFound(id.to_string()))?;

        update_fn(account);
        account.id = id.to_string();
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    /// Remove an account; false if it was not there
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.accounts.len();
        self.accounts.retain(|a| a.id != id);
        self.accounts.len() != before
    }

    /// Checksum-validate the number against the bank, then look it up
    pub fn verify<L: BankLookup + ?Sized>(
        &self,
        account_number: &str,
        bank_code: &str,
        directory: &L,
    ) -> AccountVerification {
        let outcome = codec::validate(account_number, Some(bank_code), directory);
        if !outcome.is_valid {
            return AccountVerification {
                is_valid: false,
                account_name: None,
                bank_name: outcome.bank_name,
                errors: vec![outcome.reason],
            };
        }

        match self.find_by_account_number(&outcome.nuban) {
            Some(account) => AccountVerification {
                is_valid: true,
                account_name: Some(account.account_name.clone()),
                bank_name: Some(account.bank_name.clone()),
                errors: Vec::new(),
            },
            None => AccountVerification {
                is_valid: false,
                account_name: None,
                bank_name: outcome.bank_name,
                errors: vec!["Account not found".to_string()],
            },
        }
    }

    pub fn all(&self) -> &[NubanAccount] {
        &self.accounts
    }

    pub fn count(&self) -> usize {
        self.accounts.len()
    }

    pub fn total_balance(&self) -> f64 {
        self.accounts.iter().map(|a| a.balance).sum()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FixedSerials, SeededSerials, SerialNumber};
    use crate::entities::bank::BankDirectory;
    use chrono::Duration;

    fn repo_with(accounts: &[(&str, &str, AccountType, f64)]) -> AccountRepository {
        let directory = BankDirectory::nigerian_banks();
        let mut source = SeededSerials::new(7);
        let mut repo = AccountRepository::new();
        for (bank, name, kind, balance) in accounts {
            let mut request = OpenAccountRequest::new(bank, name, *kind);
            request.initial_balance = Some(*balance);
            repo.open_account(request, &directory, &mut source).unwrap();
        }
        repo
    }

    #[test]
    fn test_open_account() {
        let directory = BankDirectory::nigerian_banks();
        let mut source = FixedSerials::new(vec![SerialNumber::parse("123456").unwrap()]);
        let mut repo = AccountRepository::new();

        let mut request = OpenAccountRequest::new("044", "  Ada Obi ", AccountType::Savings);
        request.email = Some("ada@example.com".to_string());
        let account = repo.open_account(request, &directory, &mut source).unwrap();

        assert_eq!(account.account_number, "0441234569");
        assert_eq!(account.account_name, "Ada Obi");
        assert_eq!(account.bank_name, "Access Bank");
        assert_eq!(account.sort_code.as_deref(), Some("044150149"));
        assert_eq!(account.balance, 0.0);
        assert_eq!(repo.count(), 1);
    }

    #[test]
    fn test_open_account_rejects_bad_fields() {
        let directory = BankDirectory::nigerian_banks();
        let mut source = SeededSerials::new(1);
        let mut repo = AccountRepository::new();

        let blank = OpenAccountRequest::new("044", "   ", AccountType::Current);
        assert!(matches!(
            repo.open_account(blank, &directory, &mut source),
            Err(AccountError::InvalidField { field: "account_name", .. })
        ));

        let mut bad_bvn = OpenAccountRequest::new("044", "Ada", AccountType::Current);
        bad_bvn.bvn = Some("1234".to_string());
        assert!(repo.open_account(bad_bvn, &directory, &mut source).is_err());

        let unknown = OpenAccountRequest::new("999", "Ada", AccountType::Current);
        assert_eq!(
            repo.open_account(unknown, &directory, &mut source).unwrap_err(),
            AccountError::Codec(CodecError::UnknownBank("999".to_string()))
        );

        let malformed = OpenAccountRequest::new("44", "Ada", AccountType::Current);
        assert!(matches!(
            repo.open_account(malformed, &directory, &mut source),
            Err(AccountError::Codec(CodecError::InvalidInput { .. }))
        ));

        assert_eq!(repo.count(), 0);
    }

    #[test]
    fn test_open_account_avoids_duplicate_numbers() {
        let directory = BankDirectory::nigerian_banks();
        let serials = ["111111", "111111", "222222"]
            .iter()
            .map(|s| SerialNumber::parse(s).unwrap())
            .collect();
        let mut source = FixedSerials::new(serials);
        let mut repo = AccountRepository::new();

        let a = repo
            .open_account(OpenAccountRequest::new("058", "A", AccountType::Savings), &directory, &mut source)
            .unwrap();
        let b = repo
            .open_account(OpenAccountRequest::new("058", "B", AccountType::Savings), &directory, &mut source)
            .unwrap();
        assert_ne!(a.account_number, b.account_number);
    }

    #[test]
    fn test_open_account_refuses_exhausted_serials() {
        let directory = BankDirectory::nigerian_banks();
        let mut source = FixedSerials::new(vec![SerialNumber::parse("111111").unwrap()]);
        let mut repo = AccountRepository::new();

        let first = repo
            .open_account(OpenAccountRequest::new("058", "A", AccountType::Savings), &directory, &mut source)
            .unwrap();
        assert_eq!(first.account_number, "0581111115");

        let second =
            repo.open_account(OpenAccountRequest::new("058", "B", AccountType::Savings), &directory, &mut source);
        assert_eq!(
            second.unwrap_err(),
            AccountError::DuplicateAccountNumber("058".to_string())
        );
        assert_eq!(repo.count(), 1);

        let verification = repo.verify("0581111115", "058", &directory);
        assert_eq!(verification.account_name.as_deref(), Some("A"));
    }

    #[test]
    fn test_field_validators() {
        assert!(is_valid_bvn("12345678901"));
        assert!(!is_valid_bvn("1234567890a"));

        assert!(is_valid_nigerian_phone("08031234567"));
        assert!(is_valid_nigerian_phone("+234 803 123 4567"));
        assert!(is_valid_nigerian_phone("2347031234567"));
        assert!(is_valid_nigerian_phone("9031234567"));
        assert!(!is_valid_nigerian_phone("06031234567"));
        assert!(!is_valid_nigerian_phone("0803123456"));

        assert!(is_valid_email("ada@bank.ng"));
        assert!(!is_valid_email("ada@bank"));
        assert!(!is_valid_email("ada bank@x.ng"));
        assert!(!is_valid_email("@x.ng"));
        assert!(is_valid_email("a@a.b."));
        assert!(is_valid_email("ada@mail.bank.ng"));
        assert!(!is_valid_email("a@.b"));
        assert!(!is_valid_email("a@b."));
    }

    #[test]
    fn test_list_filters_and_pages() {
        let repo = repo_with(&[
            ("044", "Ada Obi", AccountType::Savings, 100.0),
            ("044", "Bola Ade", AccountType::Current, 5_000.0),
            ("058", "Chidi Eze", AccountType::Savings, 250.0),
            ("057", "Dayo Ola", AccountType::Fixed, 90_000.0),
            ("058", "Efe Obi", AccountType::Current, 0.0),
        ]);

        let by_bank = AccountFilters {
            bank_code: Some("058".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list(&by_bank, 1, 10).total_count, 2);

        let by_search = AccountFilters {
            search_term: Some("obi".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list(&by_search, 1, 10).total_count, 2);

        let by_balance = AccountFilters {
            min_balance: Some(200.0),
            max_balance: Some(10_000.0),
            ..Default::default()
        };
        assert_eq!(repo.list(&by_balance, 1, 10).total_count, 2);

        let savings = AccountFilters {
            account_type: Some(AccountType::Savings),
            ..Default::default()
        };
        assert_eq!(repo.list(&savings, 1, 10).total_count, 2);

        let page = repo.list(&AccountFilters::default(), 3, 2);
        assert_eq!(page.total_count, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.data.len(), 1);
        // Newest first, so the last page holds the first account opened
        assert_eq!(page.data[0].account_name, "Ada Obi");

        let future = AccountFilters {
            created_from: Some(Utc::now() + Duration::days(1)),
            ..Default::default()
        };
        assert_eq!(repo.list(&future, 1, 10).total_count, 0);
    }

    #[test]
    fn test_update_and_delete() {
        let mut repo = repo_with(&[("044", "Ada Obi", AccountType::Savings, 100.0)]);
        let id = repo.all()[0].id.clone();
        let created = repo.all()[0].updated_at;

        let updated = repo
            .update(&id, |a| {
                a.balance = 150.0;
                a.id = "hijacked".to_string();
            })
            .unwrap();
        assert_eq!(updated.balance, 150.0);
        assert_eq!(updated.id, id);
        assert!(updated.updated_at >= created);

        assert!(matches!(
            repo.update("missing", |_| {}),
            Err(AccountError::NotFound(_))
        ));

        assert!(repo.delete(&id));
        assert!(!repo.delete(&id));
        assert_eq!(repo.count(), 0);
    }

    #[test]
    fn test_verify() {
        let directory = BankDirectory::nigerian_banks();
        let repo = repo_with(&[("044", "Ada Obi", AccountType::Savings, 100.0)]);
        let number = repo.all()[0].account_number.clone();

        let found = repo.verify(&number, "044", &directory);
        assert!(found.is_valid);
        assert_eq!(found.account_name.as_deref(), Some("Ada Obi"));

        let wrong_bank = repo.verify(&number, "058", &directory);
        assert!(!wrong_bank.is_valid);
        assert!(wrong_bank.errors[0].contains("Bank code mismatch"));

        // Checksum-valid but never opened
        let stranger = crate::codec::Nuban::from_parts(
            BankCode::parse("044").unwrap(),
            SerialNumber::parse("000000").unwrap(),
        )
        .to_string();
        if stranger != number {
            let missing = repo.verify(&stranger, "044", &directory);
            assert_eq!(missing.errors, vec!["Account not found".to_string()]);
        }
    }

    #[test]
    fn test_total_balance() {
        let repo = repo_with(&[
            ("044", "A", AccountType::Savings, 100.0),
            ("058", "B", AccountType::Savings, 50.5),
        ]);
        assert!((repo.total_balance() - 150.5).abs() < f64::EPSILON);
    }
}
