//! Property-based tests for the NUBAN codec.
//!
//! These use proptest to check the check-digit contract across the whole
//! bank directory and arbitrary input strings.

use proptest::prelude::*;

use nuban_toolkit::codec::{self, BankCode, Nuban, SeededSerials, SerialNumber, Verdict, SERIAL_SPACE};
use nuban_toolkit::BankDirectory;

/// Strategy for codes present in the built-in directory.
fn directory_code() -> impl Strategy<Value = BankCode> {
    let codes: Vec<BankCode> = BankDirectory::nigerian_banks()
        .codes()
        .into_iter()
        .cloned()
        .collect();
    prop::sample::select(codes)
}

/// Strategy for any 6-digit serial.
fn serial() -> impl Strategy<Value = SerialNumber> {
    (0..SERIAL_SPACE).prop_map(|i| SerialNumber::from_index(i).unwrap())
}

proptest! {
    #[test]
    fn composed_nuban_validates_for_its_bank(code in directory_code(), serial in serial()) {
        let directory = BankDirectory::nigerian_banks();
        let digit = codec::check_digit(&code, &serial);
        let raw = format!("{}{}{}", code, serial, digit);

        let outcome = codec::validate(&raw, Some(code.as_str()), &directory);
        prop_assert!(outcome.is_valid, "{} rejected: {}", raw, outcome.reason);
        prop_assert_eq!(outcome.check_digit, Some(digit.value()));
    }

    #[test]
    fn check_digit_is_deterministic(code in "[0-9]{3}", serial in "[0-9]{6}") {
        let first = codec::check_digit_str(&code, &serial).unwrap();
        let second = codec::check_digit_str(&code, &serial).unwrap();
        prop_assert_eq!(first, second);
        prop_assert!(first.value() <= 9);
    }

    #[test]
    fn validate_never_panics(raw in ".{0,40}", expected in proptest::option::of("[0-9]{0,5}")) {
        let directory = BankDirectory::nigerian_banks();
        let outcome = codec::validate(&raw, expected.as_deref(), &directory);

        prop_assert_eq!(outcome.is_valid, outcome.verdict.is_valid());
        prop_assert!(!outcome.reason.is_empty());
        prop_assert!(outcome.nuban.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn single_digit_change_in_check_position_is_caught(code in directory_code(), serial in serial(), bump in 1u8..10) {
        let directory = BankDirectory::nigerian_banks();
        let digit = codec::check_digit(&code, &serial).value();
        let wrong = (digit + bump) % 10;
        let raw = format!("{}{}{}", code, serial, wrong);

        let outcome = codec::validate(&raw, None, &directory);
        prop_assert_eq!(
            outcome.verdict,
            Verdict::CheckDigitMismatch { expected: digit, provided: wrong }
        );
    }

    #[test]
    fn malformed_check_digit_inputs_are_rejected(code in "[0-9]{0,5}", serial in "[0-9]{0,8}") {
        prop_assume!(code.len() != 3 || serial.len() != 6);
        prop_assert!(codec::check_digit_str(&code, &serial).is_err());
    }
}

#[test]
fn generated_nubans_validate_for_every_bank() {
    let directory = BankDirectory::nigerian_banks();
    let mut source = SeededSerials::new(0x4e55_4241_4e);

    for code in directory.codes() {
        for _ in 0..10_000 {
            let generated = codec::generate(code, &directory, &mut source).unwrap();
            let outcome = codec::validate(&generated.nuban.to_string(), Some(code.as_str()), &directory);
            assert!(outcome.is_valid, "{}: {}", generated.nuban, outcome.reason);
        }
    }
}

#[test]
fn every_serial_round_trips_for_one_bank() {
    let code = BankCode::parse("044").unwrap();

    for index in 0..SERIAL_SPACE {
        let serial = SerialNumber::from_index(index).unwrap();
        let nuban = Nuban::from_parts(code.clone(), serial);
        assert!(nuban.has_valid_check_digit(), "{}", nuban);

        let parsed = Nuban::parse(&nuban.to_string()).unwrap();
        assert_eq!(parsed, nuban);
    }
}
