// NUBAN Toolkit - Command Line
//
//   nuban banks
//   nuban generate 044 --count 5
//   nuban validate 0441234569 --bank 044
//   nuban check-digit 044 123456
//   nuban batch nubans.csv
//   nuban export --format csv

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nuban_toolkit::batch::read_batch_file;
use nuban_toolkit::export::{
    default_export_filename, export_csv_string, export_json, import_json, ExportFormat,
};
use nuban_toolkit::{AppConfig, NubanService, SeededSerials, ValidationOutcome, ValidationType};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nuban")]
#[command(author, version, about = "Generate and validate Nigerian NUBAN account numbers", long_about = None)]
struct Args {
    /// Path to nuban.toml (falls back to $NUBAN_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite history file (overrides [storage] db_path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the bank directory
    Banks,

    /// Generate NUBANs for a bank
    Generate {
        bank_code: String,

        #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        count: u64,

        /// Seed for reproducible serial numbers
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Validate a NUBAN (spaces and dashes are ignored)
    Validate {
        nuban: String,

        /// Expected bank code
        #[arg(long)]
        bank: Option<String>,
    },

    /// Compute the check digit for a bank code and serial number
    CheckDigit { bank_code: String, serial: String },

    /// Validate every NUBAN in a CSV or plain list
    Batch { file: PathBuf },

    /// Show generation history (or validations)
    History {
        #[arg(long)]
        validations: bool,
    },

    /// Validation statistics
    Stats,

    /// Export history
    Export {
        #[arg(short, long, default_value = "json", value_parser = parse_format)]
        format: ExportFormat,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a JSON export
    Import { file: PathBuf },
}

fn parse_format(value: &str) -> Result<ExportFormat, String> {
    ExportFormat::parse(value).ok_or_else(|| format!("unknown format '{}' (json or csv)", value))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::resolve(args.config.as_deref()).context("Failed to load config")?;
    if let Some(db) = args.db {
        config.storage.db_path = Some(db);
    }

    init_logging(&config.logging.level);

    let mut service = NubanService::from_config(&config)?;

    match args.command {
        Command::Banks => run_banks(&service),
        Command::Generate {
            bank_code,
            count,
            seed,
        } => {
            if let Some(seed) = seed {
                service = service.with_serials(SeededSerials::new(seed));
            }
            run_generate(&mut service, &bank_code, count)
        }
        Command::Validate { nuban, bank } => {
            let outcome = service.validate(&nuban, bank.as_deref(), ValidationType::Manual)?;
            print_outcome(&outcome);
            Ok(())
        }
        Command::CheckDigit { bank_code, serial } => {
            let digit = service.check_digit(&bank_code, &serial)?;
            println!("{}{}{}", bank_code, serial, digit);
            println!("Check digit: {}", digit);
            Ok(())
        }
        Command::Batch { file } => run_batch(&mut service, file),
        Command::History { validations } => run_history(&service, validations),
        Command::Stats => run_stats(&service),
        Command::Export { format, output } => run_export(&service, format, output),
        Command::Import { file } => run_import(&mut service, file),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run_banks(service: &NubanService) -> Result<()> {
    println!("🏦 {} banks", service.directory().len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for bank in service.banks() {
        println!(
            "{}  {:<12} {}{}",
            bank.code,
            bank.short_name,
            bank.name,
            if bank.is_active { "" } else { " (inactive)" }
        );
    }
    Ok(())
}

fn run_generate(service: &mut NubanService, bank_code: &str, count: u64) -> Result<()> {
    for _ in 0..count {
        let generated = service.generate(bank_code)?;
        println!(
            "{}  {} (serial {}, check digit {})",
            generated.nuban, generated.bank_name, generated.serial_number, generated.check_digit
        );
    }
    Ok(())
}

fn print_outcome(outcome: &ValidationOutcome) {
    let mark = if outcome.is_valid { "✓" } else { "✗" };
    println!("{} {}  {}", mark, outcome.nuban, outcome.reason);
}

fn run_batch(service: &mut NubanService, file: PathBuf) -> Result<()> {
    let items = read_batch_file(&file)?;
    let (outcomes, summary) = service.batch_validate(&items)?;

    for outcome in &outcomes {
        print_outcome(outcome);
    }
    println!("\n{}", summary.message());
    Ok(())
}

fn run_history(service: &NubanService, validations: bool) -> Result<()> {
    if validations {
        println!("🔍 {} validations", service.validations().len());
        for record in service.validations().entries() {
            println!(
                "{}  {}  [{}] {}",
                record.validated_at.format("%Y-%m-%d %H:%M:%S"),
                record.nuban,
                record.validation_type.as_str(),
                record.reason
            );
        }
    } else {
        println!("📜 {} generated", service.generations().len());
        for record in service.generations().entries() {
            println!(
                "{}  {}  {}",
                record.generated_at.format("%Y-%m-%d %H:%M:%S"),
                record.nuban,
                record.bank_name
            );
        }
    }
    Ok(())
}

fn run_stats(service: &NubanService) -> Result<()> {
    let stats = service.stats();
    let validations = &stats.validations;

    println!("📊 NUBAN statistics");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Banks:             {}", stats.banks);
    println!("Generated:         {}", stats.generated);
    println!("Validations:       {}", validations.total_validations);
    println!("  valid:           {}", validations.valid_count);
    println!("  invalid:         {}", validations.invalid_count);
    println!("  valid rate:      {:.1}%", validations.valid_rate() * 100.0);
    if let Some(at) = validations.last_validated_at {
        println!("Last validated:    {}", at.to_rfc3339());
    }
    Ok(())
}

fn run_export(service: &NubanService, format: ExportFormat, output: Option<PathBuf>) -> Result<()> {
    let content = match format {
        ExportFormat::Json => export_json(&service.snapshot())?,
        ExportFormat::Csv => export_csv_string(service.generations(), service.validations())?,
    };

    let path = output.unwrap_or_else(|| {
        PathBuf::from(default_export_filename(format, chrono::Utc::now().date_naive()))
    });
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("📤 Exported to {}", path.display());
    Ok(())
}

fn run_import(service: &mut NubanService, file: PathBuf) -> Result<()> {
    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let snapshot = import_json(&text)?;
    let imported = service.restore(snapshot)?;

    println!("📥 Imported {} records from {}", imported, file.display());
    Ok(())
}
