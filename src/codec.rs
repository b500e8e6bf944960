// 🔢 NUBAN Codec - check digit, validation, generation
//
// The only algorithm in the crate. Everything here is pure:
// - no logging (diagnostics go through an injected CheckDigitObserver)
// - no shared state (the bank directory is borrowed read-only)
// - randomness comes from a caller-supplied SerialSource
//
// NUBAN layout: BBB SSSSSS C
//   BBB    = 3-digit bank code
//   SSSSSS = 6-digit serial number
//   C      = check digit over the first 9 digits

use crate::entities::bank::BankLookup;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

/// CBN positional weights, one per digit of bank code + serial.
pub const WEIGHTS: [u32; 9] = [3, 7, 3, 3, 7, 3, 3, 7, 3];

pub const BANK_CODE_LENGTH: usize = 3;
pub const SERIAL_LENGTH: usize = 6;
pub const NUBAN_LENGTH: usize = BANK_CODE_LENGTH + SERIAL_LENGTH + 1;

/// Number of distinct serials (000000..=999999)
pub const SERIAL_SPACE: u32 = 1_000_000;

// ============================================================================
// ERRORS
// ============================================================================

/// Contract violations raised by the codec.
///
/// Ordinary validation failures are NOT errors - they come back as a
/// negative [`ValidationOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A fixed-width field was not exactly N ASCII digits
    #[error("{field} must be exactly {expected} digits, got {value:?}")]
    InvalidInput {
        field: &'static str,
        expected: usize,
        value: String,
    },

    /// Bank code is well-formed but absent from the directory
    #[error("unknown bank code: {0}")]
    UnknownBank(String),
}

fn fixed_digits(value: &str, expected: usize, field: &'static str) -> Result<String, CodecError> {
    if value.len() == expected && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(value.to_string())
    } else {
        Err(CodecError::InvalidInput {
            field,
            expected,
            value: value.to_string(),
        })
    }
}

// ============================================================================
// VALUE TYPES
// ============================================================================

/// Exactly 3 ASCII digits identifying a financial institution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BankCode(String);

impl BankCode {
    pub fn parse(value: &str) -> Result<Self, CodecError> {
        fixed_digits(value, BANK_CODE_LENGTH, "bank code").map(BankCode)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BankCode {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BankCode::parse(&value)
    }
}

impl From<BankCode> for String {
    fn from(code: BankCode) -> Self {
        code.0
    }
}

// Lets BTreeMap<BankCode, _> be queried with a plain &str
impl Borrow<str> for BankCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BankCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exactly 6 ASCII digits identifying an account within a bank.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerialNumber(String);

impl SerialNumber {
    pub fn parse(value: &str) -> Result<Self, CodecError> {
        fixed_digits(value, SERIAL_LENGTH, "serial number").map(SerialNumber)
    }

    /// Zero-padded serial for an index in 0..SERIAL_SPACE
    pub fn from_index(index: u32) -> Result<Self, CodecError> {
        if index < SERIAL_SPACE {
            Ok(SerialNumber(format!("{:06}", index)))
        } else {
            Err(CodecError::InvalidInput {
                field: "serial number",
                expected: SERIAL_LENGTH,
                value: index.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SerialNumber {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SerialNumber::parse(&value)
    }
}

impl From<SerialNumber> for String {
    fn from(serial: SerialNumber) -> Self {
        serial.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single digit 0-9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CheckDigit(u8);

impl CheckDigit {
    pub fn new(value: u8) -> Result<Self, CodecError> {
        if value <= 9 {
            Ok(CheckDigit(value))
        } else {
            Err(CodecError::InvalidInput {
                field: "check digit",
                expected: 1,
                value: value.to_string(),
            })
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for CheckDigit {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        CheckDigit::new(value)
    }
}

impl From<CheckDigit> for u8 {
    fn from(digit: CheckDigit) -> Self {
        digit.0
    }
}

impl fmt::Display for CheckDigit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// BankCode ∥ SerialNumber ∥ CheckDigit.
///
/// Holding a `Nuban` says nothing about checksum validity; that is the
/// derived predicate [`Nuban::has_valid_check_digit`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nuban {
    bank_code: BankCode,
    serial_number: SerialNumber,
    check_digit: CheckDigit,
}

impl Nuban {
    /// Build a NUBAN whose check digit is correct by construction
    pub fn from_parts(bank_code: BankCode, serial_number: SerialNumber) -> Self {
        let check_digit = check_digit(&bank_code, &serial_number);
        Nuban {
            bank_code,
            serial_number,
            check_digit,
        }
    }

    /// Strict parse: exactly 10 ASCII digits, no formatting stripped
    pub fn parse(value: &str) -> Result<Self, CodecError> {
        let digits = fixed_digits(value, NUBAN_LENGTH, "NUBAN")?;
        Ok(split_digits(&digits))
    }

    pub fn bank_code(&self) -> &BankCode {
        &self.bank_code
    }

    pub fn serial_number(&self) -> &SerialNumber {
        &self.serial_number
    }

    pub fn check_digit(&self) -> CheckDigit {
        self.check_digit
    }

    pub fn has_valid_check_digit(&self) -> bool {
        check_digit(&self.bank_code, &self.serial_number) == self.check_digit
    }
}

impl fmt::Display for Nuban {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.bank_code, self.serial_number, self.check_digit)
    }
}

impl TryFrom<String> for Nuban {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Nuban::parse(&value)
    }
}

impl From<Nuban> for String {
    fn from(nuban: Nuban) -> Self {
        nuban.to_string()
    }
}

// Caller guarantees `digits` is exactly NUBAN_LENGTH ASCII digits
fn split_digits(digits: &str) -> Nuban {
    Nuban {
        bank_code: BankCode(digits[..3].to_string()),
        serial_number: SerialNumber(digits[3..9].to_string()),
        check_digit: CheckDigit(digits.as_bytes()[9] - b'0'),
    }
}

// ============================================================================
// CHECK DIGIT
// ============================================================================

/// Receives the intermediate steps of a check digit computation.
///
/// Both hooks default to no-ops so observers implement only what they need.
pub trait CheckDigitObserver {
    fn term(&mut self, _position: usize, _digit: u32, _weight: u32) {}

    fn finished(&mut self, _sum: u32, _remainder: u32, _check_digit: CheckDigit) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CheckDigitObserver for NoopObserver {}

/// Check digit for a bank code and serial number.
pub fn check_digit(bank_code: &BankCode, serial: &SerialNumber) -> CheckDigit {
    check_digit_observed(bank_code, serial, &mut NoopObserver)
}

/// Same as [`check_digit`], reporting every weighted term to `observer`.
pub fn check_digit_observed<O: CheckDigitObserver + ?Sized>(
    bank_code: &BankCode,
    serial: &SerialNumber,
    observer: &mut O,
) -> CheckDigit {
    let digits = bank_code
        .as_str()
        .bytes()
        .chain(serial.as_str().bytes())
        .map(|b| u32::from(b - b'0'));

    let mut sum = 0;
    for (position, (digit, weight)) in digits.zip(WEIGHTS).enumerate() {
        observer.term(position, digit, weight);
        sum += digit * weight;
    }

    let remainder = sum % 10;
    let value = if remainder == 0 { 0 } else { 10 - remainder };
    let check = CheckDigit(value as u8);

    observer.finished(sum, remainder, check);
    check
}

/// String-typed entry point. Rejects anything that is not exactly
/// 3 + 6 ASCII digits instead of coercing it.
pub fn check_digit_str(bank_code: &str, serial: &str) -> Result<CheckDigit, CodecError> {
    let bank_code = BankCode::parse(bank_code)?;
    let serial = SerialNumber::parse(serial)?;
    Ok(check_digit(&bank_code, &serial))
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Machine-readable result of a validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    Valid,
    WrongLength { observed: usize },
    BankCodeMismatch { embedded: String, expected: String },
    UnknownBankCode { code: String },
    CheckDigitMismatch { expected: u8, provided: u8 },
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Valid => "valid",
            Verdict::WrongLength { .. } => "wrong length",
            Verdict::BankCodeMismatch { .. } => "bank code mismatch",
            Verdict::UnknownBankCode { .. } => "unknown bank code",
            Verdict::CheckDigitMismatch { .. } => "check digit mismatch",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

/// Outcome of [`validate`]. Field names are a stable contract for the
/// JSON/CSV exporters.
///
/// The decomposed fields are `None` only when the length check failed.
/// `check_digit` is the digit that was PROVIDED, not the expected one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub nuban: String,
    pub is_valid: bool,
    pub reason: String,
    pub verdict: Verdict,
    pub bank_code: Option<String>,
    pub bank_name: Option<String>,
    pub serial_number: Option<String>,
    pub check_digit: Option<u8>,
}

/// Strip everything that is not an ASCII digit.
pub fn clean(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validate a raw, possibly formatted NUBAN.
///
/// Checks run in order: length, expected bank code, directory membership,
/// checksum. The first failure wins. Never panics on any input.
pub fn validate<L: BankLookup + ?Sized>(
    raw: &str,
    expected_bank_code: Option<&str>,
    directory: &L,
) -> ValidationOutcome {
    let cleaned = clean(raw);

    if cleaned.len() != NUBAN_LENGTH {
        let observed = cleaned.len();
        return ValidationOutcome {
            nuban: cleaned,
            is_valid: false,
            reason: format!(
                "NUBAN must be exactly {} digits. Provided: {} digits",
                NUBAN_LENGTH, observed
            ),
            verdict: Verdict::WrongLength { observed },
            bank_code: None,
            bank_name: None,
            serial_number: None,
            check_digit: None,
        };
    }

    let parts = split_digits(&cleaned);
    let embedded = parts.bank_code.as_str();
    let provided = parts.check_digit;

    let mut outcome = ValidationOutcome {
        nuban: cleaned.clone(),
        is_valid: false,
        reason: String::new(),
        verdict: Verdict::Valid,
        bank_code: Some(embedded.to_string()),
        bank_name: None,
        serial_number: Some(parts.serial_number.to_string()),
        check_digit: Some(provided.value()),
    };

    if let Some(expected) = expected_bank_code {
        if expected != embedded {
            outcome.reason = format!(
                "Bank code mismatch. NUBAN bank code: {}, Expected: {}",
                embedded, expected
            );
            outcome.verdict = Verdict::BankCodeMismatch {
                embedded: embedded.to_string(),
                expected: expected.to_string(),
            };
            return outcome;
        }
    }

    let Some(bank) = directory.resolve(embedded) else {
        outcome.reason = format!("Invalid bank code: {}", embedded);
        outcome.verdict = Verdict::UnknownBankCode {
            code: embedded.to_string(),
        };
        return outcome;
    };
    outcome.bank_name = Some(bank.name.clone());

    let expected = check_digit(&parts.bank_code, &parts.serial_number);
    if expected == provided {
        outcome.is_valid = true;
        outcome.reason = format!("Valid NUBAN for {}", bank.name);
    } else {
        outcome.reason = format!(
            "Invalid check digit. Expected: {}, Got: {}",
            expected, provided
        );
        outcome.verdict = Verdict::CheckDigitMismatch {
            expected: expected.value(),
            provided: provided.value(),
        };
    }

    outcome
}

/// Format-only check: exactly 10 ASCII digits, no formatting allowed.
pub fn is_valid_format(raw: &str) -> bool {
    raw.len() == NUBAN_LENGTH && raw.bytes().all(|b| b.is_ascii_digit())
}

// ============================================================================
// GENERATION
// ============================================================================

/// Supplies serial numbers for generation.
pub trait SerialSource {
    fn next_serial(&mut self) -> SerialNumber;
}

/// Uniform serials from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSerials;

impl SerialSource for ThreadRngSerials {
    fn next_serial(&mut self) -> SerialNumber {
        let index = rand::rng().random_range(0..SERIAL_SPACE);
        SerialNumber(format!("{:06}", index))
    }
}

/// Reproducible uniform serials from a seed.
#[derive(Debug, Clone)]
pub struct SeededSerials {
    rng: StdRng,
}

impl SeededSerials {
    pub fn new(seed: u64) -> Self {
        SeededSerials {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SerialSource for SeededSerials {
    fn next_serial(&mut self) -> SerialNumber {
        let index = self.rng.random_range(0..SERIAL_SPACE);
        SerialNumber(format!("{:06}", index))
    }
}

/// Cycles through a fixed list. An empty list yields 000000 forever.
#[derive(Debug, Clone, Default)]
pub struct FixedSerials {
    serials: Vec<SerialNumber>,
    next: usize,
}

impl FixedSerials {
    pub fn new(serials: Vec<SerialNumber>) -> Self {
        FixedSerials { serials, next: 0 }
    }
}

impl SerialSource for FixedSerials {
    fn next_serial(&mut self) -> SerialNumber {
        if self.serials.is_empty() {
            return SerialNumber("000000".to_string());
        }
        let serial = self.serials[self.next % self.serials.len()].clone();
        self.next += 1;
        serial
    }
}

/// A freshly generated NUBAN plus its decomposed parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedNuban {
    pub nuban: Nuban,
    pub bank_code: BankCode,
    pub bank_name: String,
    pub serial_number: SerialNumber,
    pub check_digit: CheckDigit,
}

/// Generate a NUBAN for a bank in the directory.
pub fn generate<L, S>(
    bank_code: &BankCode,
    directory: &L,
    source: &mut S,
) -> Result<GeneratedNuban, CodecError>
where
    L: BankLookup + ?Sized,
    S: SerialSource + ?Sized,
{
    let bank = directory
        .resolve(bank_code.as_str())
        .ok_or_else(|| CodecError::UnknownBank(bank_code.to_string()))?;

    let serial_number = source.next_serial();
    let nuban = Nuban::from_parts(bank_code.clone(), serial_number.clone());

    Ok(GeneratedNuban {
        check_digit: nuban.check_digit(),
        nuban,
        bank_code: bank_code.clone(),
        bank_name: bank.name.clone(),
        serial_number,
    })
}

// ============================================================================
// TESTS
// ============================================================================
