// Entity Models
//
// - bank:    the CBN bank directory the codec resolves codes against
// - account: NUBAN-numbered accounts opened through the codec

pub mod bank;
pub mod account;

pub use bank::{Bank, BankDirectory, BankLookup, DirectoryError};
pub use account::{
    AccountError, AccountFilters, AccountRepository, AccountType, AccountVerification,
    NubanAccount, OpenAccountRequest, Page,
};
