// 🏦 Bank Entity + Bank Directory
//
// The directory is the authoritative mapping BankCode -> bank metadata.
// It is built once and never mutated; the codec only ever borrows it
// through the BankLookup trait.

use crate::codec::BankCode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// BANK ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    /// CBN 3-digit institution code
    pub code: BankCode,

    /// Full registered name (e.g. "Guaranty Trust Bank Plc")
    pub name: String,

    /// Display name (e.g. "GTBank")
    pub short_name: String,

    /// 9-digit branch sort code, when known
    pub sort_code: Option<String>,

    pub is_active: bool,
}

impl Bank {
    pub fn new(code: BankCode, name: &str, short_name: &str) -> Self {
        Bank {
            code,
            name: name.to_string(),
            short_name: short_name.to_string(),
            sort_code: None,
            is_active: true,
        }
    }

    pub fn with_sort_code(mut self, sort_code: &str) -> Self {
        self.sort_code = Some(sort_code.to_string());
        self
    }

    /// Case-insensitive match on full or short name
    pub fn matches_name(&self, name: &str) -> bool {
        let lower = name.trim().to_lowercase();
        self.name.to_lowercase() == lower || self.short_name.to_lowercase() == lower
    }
}

// ============================================================================
// LOOKUP COLLABORATOR
// ============================================================================

/// What the codec needs from a bank directory: resolve a code or report
/// it absent.
pub trait BankLookup {
    fn resolve(&self, code: &str) -> Option<&Bank>;

    fn contains(&self, code: &str) -> bool {
        self.resolve(code).is_some()
    }
}

// ============================================================================
// BANK DIRECTORY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("duplicate bank code in directory: {0}")]
    DuplicateCode(String),
}

/// Immutable code -> bank mapping, iterated in code order.
#[derive(Debug, Clone, Default)]
pub struct BankDirectory {
    banks: BTreeMap<BankCode, Bank>,
}

/// Row layout for directory CSV files
#[derive(Debug, Deserialize)]
struct BankRow {
    code: String,
    name: String,
    short_name: Option<String>,
    sort_code: Option<String>,
    is_active: Option<bool>,
}

impl BankDirectory {
    /// Build from a list of banks. Duplicate codes are rejected, not merged.
    pub fn from_banks<I>(banks: I) -> Result<Self, DirectoryError>
    where
        I: IntoIterator<Item = Bank>,
    {
        let mut map = BTreeMap::new();
        for bank in banks {
            let code = bank.code.clone();
            if map.insert(code.clone(), bank).is_some() {
                return Err(DirectoryError::DuplicateCode(code.to_string()));
            }
        }
        Ok(BankDirectory { banks: map })
    }

    /// Load a directory from CSV (code,name,short_name,sort_code,is_active)
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open bank directory {}", path.display()))?;

        let mut banks = Vec::new();
        for (line, result) in rdr.deserialize().enumerate() {
            let row: BankRow = result.context("Failed to deserialize bank row")?;
            let code = BankCode::parse(row.code.trim())
                .with_context(|| format!("Bad bank code on data row {}", line + 1))?;
            let short_name = row
                .short_name
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| row.name.clone());

            let mut bank = Bank::new(code, row.name.trim(), short_name.trim());
            bank.sort_code = row.sort_code.filter(|s| !s.trim().is_empty());
            bank.is_active = row.is_active.unwrap_or(true);
            banks.push(bank);
        }

        Ok(Self::from_banks(banks)?)
    }

    /// The built-in CBN commercial bank list
    pub fn nigerian_banks() -> Self {
        let entries: [(&str, &str, &str, Option<&str>); 23] = [
            ("044", "Access Bank", "Access Bank", Some("044150149")),
            ("014", "Afribank Nigeria Plc", "Afribank", None),
            ("023", "Citibank Nigeria Limited", "Citibank", None),
            ("063", "Diamond Bank Plc", "Diamond Bank", None),
            ("050", "Ecobank Nigeria Plc", "Ecobank", Some("050150010")),
            ("084", "Enterprise Bank Limited", "Enterprise Bank", None),
            ("070", "Fidelity Bank Plc", "Fidelity Bank", Some("070150003")),
            ("011", "First Bank of Nigeria Limited", "First Bank", Some("011151003")),
            ("214", "First City Monument Bank Plc", "FCMB", None),
            ("058", "Guaranty Trust Bank Plc", "GTBank", Some("058152052")),
            ("030", "Heritage Banking Company Ltd", "Heritage Bank", None),
            ("082", "Keystone Bank Limited", "Keystone Bank", None),
            ("076", "Skye Bank Plc", "Skye Bank", None),
            ("221", "Stanbic IBTC Bank Plc", "Stanbic IBTC", Some("221159522")),
            ("068", "Standard Chartered Bank Nigeria Ltd", "Standard Chartered", None),
            ("232", "Sterling Bank Plc", "Sterling Bank", Some("232150016")),
            ("033", "United Bank for Africa Plc", "UBA", Some("033153513")),
            ("032", "Union Bank of Nigeria Plc", "Union Bank", Some("032080474")),
            ("215", "Unity Bank Plc", "Unity Bank", None),
            ("035", "Wema Bank Plc", "Wema Bank", None),
            ("057", "Zenith Bank Plc", "Zenith Bank", Some("057150013")),
            ("101", "Providus Bank", "Providus Bank", None),
            ("102", "Titan Trust Bank", "Titan Trust Bank", None),
        ];

        let banks = entries
            .iter()
            .filter_map(|(code, name, short, sort)| {
                let bank = Bank::new(BankCode::parse(code).ok()?, name, short);
                Some(match sort {
                    Some(sort) => bank.with_sort_code(sort),
                    None => bank,
                })
            })
            .map(|bank| (bank.code.clone(), bank))
            .collect();

        BankDirectory { banks }
    }

    /// Find a bank by full or short name (case-insensitive)
    pub fn find_by_name(&self, name: &str) -> Option<&Bank> {
        self.banks.values().find(|bank| bank.matches_name(name))
    }

    /// All banks, ordered by code
    pub fn all(&self) -> Vec<&Bank> {
        self.banks.values().collect()
    }

    pub fn active(&self) -> Vec<&Bank> {
        self.banks.values().filter(|b| b.is_active).collect()
    }

    pub fn codes(&self) -> Vec<&BankCode> {
        self.banks.keys().collect()
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }
}

impl BankLookup for BankDirectory {
    fn resolve(&self, code: &str) -> Option<&Bank> {
        self.banks.get(code)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn code(s: &str) -> BankCode {
        BankCode::parse(s).unwrap()
    }

    #[test]
    fn test_builtin_directory() {
        let directory = BankDirectory::nigerian_banks();
        assert_eq!(directory.len(), 23);

        let gtb = directory.resolve("058").unwrap();
        assert_eq!(gtb.short_name, "GTBank");
        assert_eq!(gtb.sort_code.as_deref(), Some("058152052"));

        assert!(directory.resolve("999").is_none());
        assert!(directory.resolve("58").is_none());
        assert!(!directory.contains("abc"));
    }

    #[test]
    fn test_codes_are_ordered() {
        let directory = BankDirectory::nigerian_banks();
        let codes: Vec<&str> = directory.codes().iter().map(|c| c.as_str()).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        assert_eq!(codes, sorted);
        assert_eq!(codes.first(), Some(&"011"));
    }

    #[test]
    fn test_find_by_name() {
        let directory = BankDirectory::nigerian_banks();

        assert_eq!(directory.find_by_name("gtbank").unwrap().code.as_str(), "058");
        assert_eq!(
            directory.find_by_name("Zenith Bank Plc").unwrap().code.as_str(),
            "057"
        );
        assert!(directory.find_by_name("Chase").is_none());
    }

    #[test]
    fn test_duplicate_codes_rejected() {
        let result = BankDirectory::from_banks(vec![
            Bank::new(code("001"), "One", "One"),
            Bank::new(code("001"), "Other", "Other"),
        ]);
        assert_eq!(
            result.unwrap_err(),
            DirectoryError::DuplicateCode("001".to_string())
        );
    }

    #[test]
    fn test_active_filter() {
        let mut closed = Bank::new(code("002"), "Closed Bank", "Closed");
        closed.is_active = false;
        let directory =
            BankDirectory::from_banks(vec![Bank::new(code("001"), "Open", "Open"), closed]).unwrap();

        assert_eq!(directory.len(), 2);
        assert_eq!(directory.active().len(), 1);
        // Inactive banks still resolve
        assert!(directory.resolve("002").is_some());
    }

    #[test]
    fn test_from_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "code,name,short_name,sort_code,is_active").unwrap();
        writeln!(file, "044,Access Bank,Access,044150149,true").unwrap();
        writeln!(file, "999,Test Bank,,,").unwrap();
        file.flush().unwrap();

        let directory = BankDirectory::from_csv(file.path()).unwrap();
        assert_eq!(directory.len(), 2);

        let test = directory.resolve("999").unwrap();
        assert_eq!(test.short_name, "Test Bank");
        assert!(test.sort_code.is_none());
        assert!(test.is_active);
    }

    #[test]
    fn test_from_csv_bad_code() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "code,name,short_name,sort_code,is_active").unwrap();
        writeln!(file, "44,Short Code Bank,,,").unwrap();
        file.flush().unwrap();

        assert!(BankDirectory::from_csv(file.path()).is_err());
    }
}
