//! cpqmig CLI - migrate CPQ exports to the mainframe
//!
//! # Main Commands
//!
//! ```bash
//! cpqmig run                       # Process inputs and upload the outputs
//! cpqmig process --kind csv        # Process inputs only
//! cpqmig upload                    # Upload an existing output directory
//! cpqmig upload --to-dir /mnt/mvs   # Copy outputs into a mounted directory
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! cpqmig inspect input.xlsx        # Encoding, header and schema match of one file
//! cpqmig schemas                   # List the schema registry
//! ```
//!
//! Settings come from the environment and an optional `.env` file.

use clap::{Parser, Subcommand};
use cpqmig::logs::{log_error, log_info, log_success, log_warning, RUN_LOG};
use cpqmig::parser::is_workbook;
use cpqmig::{
    clean_output_dir, discover, list_outputs, read_candidate, remove_inputs, write_outputs,
    AppConfig, BatchSummary, ConfigError, ConfigResult, Delivery, DeliveryReport, Destination,
    DirectoryTransport, DryRunTransport, FtpTransport, InputDelimiter, MigrationError,
    MigrationResult, Migrator, ReplacementTable, SchemaMatcher, SchemaRegistry, SourceKind,
    Transformer, Transport,
};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cpqmig")]
#[command(about = "Migrate CPQ spreadsheet and CSV exports to mainframe layouts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone, Default)]
struct BatchArgs {
    /// Input kind (overrides INPUT_KIND)
    #[arg(short, long, value_enum)]
    kind: Option<SourceKind>,

    /// Delimiter of CSV inputs: one character or 'auto' (overrides INPUT_DELIMITER)
    #[arg(short = 'd', long)]
    input_delimiter: Option<String>,

    /// Write the batch summary as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the input directory, then upload the outputs
    Run {
        #[command(flatten)]
        batch: BatchArgs,

        /// Do not upload (overrides SKIP_UPLOAD)
        #[arg(long)]
        skip_upload: bool,

        /// Copy outputs into this directory instead of FTP (overrides DELIVERY_DIR)
        #[arg(long)]
        to_dir: Option<PathBuf>,
    },

    /// Process the input directory without uploading
    Process {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Upload the files of the output directory
    Upload {
        /// Directory to upload (default: OUTPUT_DIR)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Copy outputs into this directory instead of FTP (overrides DELIVERY_DIR)
        #[arg(long)]
        to_dir: Option<PathBuf>,
    },

    /// Show how one file would be read and matched
    Inspect {
        /// Input file
        input: PathBuf,

        /// Input kind (default: sniffed from content)
        #[arg(short, long, value_enum)]
        kind: Option<SourceKind>,

        /// Delimiter of CSV input: one character or 'auto'
        #[arg(short = 'd', long)]
        input_delimiter: Option<String>,
    },

    /// List the schema registry
    Schemas,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            batch,
            skip_upload,
            to_dir,
        } => cmd_run(&batch, skip_upload, to_dir).await,
        Commands::Process { batch } => cmd_process(&batch).map(|_| ()),
        Commands::Upload { dir, to_dir } => cmd_upload(dir.as_deref(), to_dir).await,
        Commands::Inspect {
            input,
            kind,
            input_delimiter,
        } => cmd_inspect(&input, kind, input_delimiter.as_deref()),
        Commands::Schemas => cmd_schemas(),
    };

    if let Err(e) = result {
        log_error(format!("Error: {}", e));
        std::process::exit(1);
    }
}

/// Settings with CLI overrides applied.
fn load_config(batch: &BatchArgs) -> ConfigResult<AppConfig> {
    let mut config = AppConfig::from_env()?;
    if let Some(kind) = batch.kind {
        config.input_kind = kind;
    }
    if let Some(value) = &batch.input_delimiter {
        config.input_delimiter = parse_input_delimiter(value)?;
    }
    Ok(config)
}

fn parse_input_delimiter(value: &str) -> ConfigResult<InputDelimiter> {
    InputDelimiter::from_setting(value).ok_or_else(|| ConfigError::InvalidSetting {
        name: "--input-delimiter".to_string(),
        value: value.to_string(),
        message: "expected one ASCII character or 'auto'".to_string(),
    })
}

fn start_log(config: &AppConfig) {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = config.log_dir.join(format!("migration_{}.log", stamp));
    if let Err(e) = RUN_LOG.attach_file(&path) {
        log_warning(format!("Cannot write log file {}: {}", path.display(), e));
    }
}

async fn cmd_run(
    batch: &BatchArgs,
    skip_upload: bool,
    to_dir: Option<PathBuf>,
) -> MigrationResult<()> {
    let mut config = load_config(batch)?;
    if to_dir.is_some() {
        config.delivery_dir = to_dir;
    }
    let (_, written) = process(&config, batch.report.as_deref())?;

    if skip_upload || config.skip_upload {
        log_info("⏭️  Upload skipped");
    } else {
        let report = upload(&config, &written).await?;
        check_delivery(&report)?;
    }

    finish();
    Ok(())
}

fn cmd_process(batch: &BatchArgs) -> MigrationResult<BatchSummary> {
    let config = load_config(batch)?;
    let (summary, _) = process(&config, batch.report.as_deref())?;
    finish();
    Ok(summary)
}

async fn cmd_upload(dir: Option<&Path>, to_dir: Option<PathBuf>) -> MigrationResult<()> {
    let mut config = load_config(&BatchArgs::default())?;
    if to_dir.is_some() {
        config.delivery_dir = to_dir;
    }
    start_log(&config);

    let dir = dir.unwrap_or(config.output_dir.as_path());
    let files = list_outputs(dir)?;
    if files.is_empty() {
        log_warning(format!("No output files in {}", dir.display()));
        return Ok(());
    }

    let report = upload(&config, &files).await?;
    check_delivery(&report)?;
    finish();
    Ok(())
}

/// Load configuration, process the batch, write outputs.
fn process(
    config: &AppConfig,
    report: Option<&Path>,
) -> MigrationResult<(BatchSummary, Vec<PathBuf>)> {
    start_log(config);
    log_info("🚀 CPQ migration");
    log_info(format!("   Mode: {}", config.input_kind));
    log_info(format!("   Input: {}", config.input_dir().display()));
    log_info(format!("   Output: {}", config.output_dir.display()));

    // Configuration errors stop here, before any file is touched
    let registry = SchemaRegistry::load(&config.schemas_file)?;
    log_success(format!(
        "{} schemas loaded from {}",
        registry.len(),
        config.schemas_file.display()
    ));
    let replacements = ReplacementTable::load(&config.replacements_file)?;
    log_success(format!(
        "{} replacements loaded from {}",
        replacements.len(),
        config.replacements_file.display()
    ));

    let discovered = discover(config.input_dir(), config.input_kind)?;
    log_info(format!("🔍 {} file(s) found", discovered.len()));

    let removed = clean_output_dir(&config.output_dir)?;
    if removed > 0 {
        log_info(format!("🧹 {} previous output file(s) removed", removed));
    }

    let migrator = Migrator::new(
        &registry,
        &replacements,
        config.output,
        config.input_kind,
        config.input_delimiter,
    );
    let summary = migrator.run_batch(discovered);

    log_info("");
    log_info("💾 Writing outputs");
    let written = write_outputs(&config.output_dir, &summary.processed)?;

    if config.keep_input {
        log_info("Input files kept (KEEP_INPUT=true)");
    } else {
        let removed = remove_inputs(&summary.processed)?;
        log_info(format!("🗑️  {} input file(s) removed", removed));
    }

    summary.log_report();

    if let Some(path) = report {
        fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        log_info(format!("Report saved to: {}", path.display()));
    }

    Ok((summary, written))
}

/// Deliver to the configured destination.
async fn upload(config: &AppConfig, files: &[PathBuf]) -> MigrationResult<DeliveryReport> {
    let delivery = Delivery::new(config.upload_retries);
    let report = match config.destination() {
        Destination::Directory(dir) => {
            let mut transport = DirectoryTransport::new(dir);
            deliver(&delivery, &mut transport, files).await?
        }
        Destination::Ftp(ftp) => {
            let mut transport = FtpTransport::new(ftp);
            deliver(&delivery, &mut transport, files).await?
        }
        Destination::DryRun => {
            log_warning("Neither DELIVERY_DIR nor FTP_HOST is set, nothing will be sent");
            let mut transport = DryRunTransport::new();
            deliver(&delivery, &mut transport, files).await?
        }
    };
    Ok(report)
}

async fn deliver<T: Transport>(
    delivery: &Delivery,
    transport: &mut T,
    files: &[PathBuf],
) -> MigrationResult<DeliveryReport> {
    let report = delivery.deliver(transport, files).await?;
    log_info(format!(
        "📦 Uploaded {}, failed {}",
        report.uploaded.len(),
        report.failed.len()
    ));
    Ok(report)
}

fn check_delivery(report: &DeliveryReport) -> MigrationResult<()> {
    if report.is_complete() {
        Ok(())
    } else {
        Err(MigrationError::Delivery {
            failed: report.failed.iter().map(|(name, _)| name.clone()).collect(),
        })
    }
}

fn finish() {
    if let Some(path) = RUN_LOG.file_path() {
        log_info(format!("Log saved to: {}", path.display()));
    }
    log_info("✨ Done!");
}

fn cmd_inspect(
    input: &Path,
    kind: Option<SourceKind>,
    input_delimiter: Option<&str>,
) -> MigrationResult<()> {
    let config = AppConfig::from_env()?;
    let bytes = fs::read(input)?;

    let kind = kind.unwrap_or(if is_workbook(&bytes) {
        SourceKind::Xlsx
    } else {
        SourceKind::Csv
    });
    let delimiter = match input_delimiter {
        Some(value) => parse_input_delimiter(value)?,
        None => config.input_delimiter,
    };

    eprintln!("📄 Inspecting: {}", input.display());
    eprintln!("   Kind: {}", kind);

    let candidate = read_candidate(input, &bytes, kind, delimiter)?;
    eprintln!("   Encoding: {}", candidate.encoding);
    eprintln!("   Rows: {}", candidate.rows.len());
    if let Some(header) = candidate.header_at(1) {
        eprintln!("   First row: {}", header.join(" | "));
    }

    let registry = SchemaRegistry::load(&config.schemas_file)?;
    let matcher = SchemaMatcher::new(&registry);
    match matcher.name_hint(&candidate.stem()) {
        Some(hint) => eprintln!("   Name hint: {}", hint.name()),
        None => eprintln!("   Name hint: none"),
    }

    match matcher.resolve(&candidate, &HashSet::new()) {
        Ok(outcome) => {
            eprintln!("   ✅ {}", outcome.describe());
            let replacements = ReplacementTable::load(&config.replacements_file)?;
            let transformer = Transformer::new(&replacements, config.output);
            match transformer.transform(&candidate, outcome.schema()) {
                Ok(result) => {
                    eprintln!(
                        "   ✅ {} rows → {}",
                        result.rows.len(),
                        result.output_name()
                    );
                    println!("{}", serde_json::to_string_pretty(&result.diagnostics)?);
                }
                Err(e) => eprintln!("   ❌ {} ({})", e, e.kind()),
            }
        }
        Err(e) => eprintln!("   ❌ {} ({})", e, e.kind()),
    }
    Ok(())
}

fn cmd_schemas() -> MigrationResult<()> {
    let config = AppConfig::from_env()?;
    let registry = SchemaRegistry::load(&config.schemas_file)?;

    println!("📋 Schemas ({}) from {}\n", registry.len(), config.schemas_file.display());
    for schema in registry.iter() {
        println!(
            "  {} - {} columns{}",
            schema.name(),
            schema.required_count(),
            if schema.wildcard() { " + extra" } else { "" }
        );
        println!(
            "     header row {}, skip rows {:?}",
            schema.header_row(),
            schema.skip_rows()
        );
        if !schema.numeric_date_columns().is_empty() {
            println!("     dates: {}", schema.numeric_date_columns().join(", "));
        }
    }
    Ok(())
}
