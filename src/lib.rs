// NUBAN Toolkit - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod codec;      // Check digit, validation, generation
pub mod entities;   // Bank directory + accounts
pub mod history;    // Generation / validation logs
pub mod batch;      // Parallel batch validation
pub mod db;         // SQLite persistence
pub mod export;     // JSON / CSV export + import
pub mod config;     // nuban.toml
pub mod service;    // Facade for CLI and server

// Re-export commonly used types
pub use codec::{
    check_digit, check_digit_str, clean, generate, is_valid_format, validate,
    BankCode, CheckDigit, CheckDigitObserver, CodecError, GeneratedNuban, NoopObserver, Nuban,
    SeededSerials, SerialNumber, SerialSource, ThreadRngSerials, ValidationOutcome, Verdict,
};
pub use entities::{Bank, BankDirectory, BankLookup};
pub use history::{
    GenerationHistory, GenerationRecord, ValidationHistory, ValidationRecord, ValidationStats,
    ValidationType,
};
pub use batch::{validate_batch, BatchItem, BatchSummary};
pub use db::{open_database, setup_database, Event};
pub use export::{export_csv, export_json, import_json, ExportFormat, Snapshot};
pub use config::{AppConfig, ConfigError};
pub use service::{NubanService, ServiceStats, TracingObserver};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
