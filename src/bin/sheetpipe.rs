//! sheetpipe - import spreadsheets into SQLite tables.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use sheetpipe::generator::ValueGeneratorRegistry;
use sheetpipe::import::expand_inputs;
use sheetpipe::{ImportConfig, Importer};

/// Stream spreadsheet rows into relational tables
#[derive(Parser)]
#[command(name = "sheetpipe", version, about = "Import .xlsx/.xls sheets into SQLite tables")]
struct Cli {
    /// Enable debug logging (RUST_LOG still applies)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import one or more spreadsheet files
    Import {
        /// Destination SQLite database; must already exist
        #[arg(long, value_name = "PATH")]
        db: PathBuf,

        /// Import configuration (.toml or .json)
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Run files concurrently, each in its own transaction
        #[arg(long)]
        parallel: bool,

        /// Spreadsheet files or glob patterns
        #[arg(value_name = "FILES", required = true)]
        files: Vec<String>,
    },

    /// Print the structure of a destination table as JSON
    Describe {
        #[arg(long, value_name = "PATH")]
        db: PathBuf,

        table: String,
    },

    /// List the available value generators
    Generators,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let registry = Arc::new(ValueGeneratorRegistry::with_builtins());

    match cli.command {
        Command::Import {
            db,
            config,
            parallel,
            files,
        } => cmd_import(&db, &config, parallel, &files, registry),
        Command::Describe { db, table } => cmd_describe(&db, &table, registry),
        Command::Generators => cmd_generators(&registry),
    }
}

fn cmd_import(
    db: &Path,
    config: &Path,
    parallel: bool,
    files: &[String],
    registry: Arc<ValueGeneratorRegistry>,
) -> Result<ExitCode> {
    if !db.is_file() {
        bail!("database {} does not exist", db.display());
    }
    let config = ImportConfig::load(config)
        .with_context(|| format!("failed to load config {}", config.display()))?;
    config.validate().context("invalid import config")?;

    let paths = expand_inputs(files).context("failed to expand input files")?;
    info!(files = paths.len(), parallel, table = %config.table_name, "starting import");

    let importer = Importer::new(db, registry);
    let reports = importer.import_files(&paths, &config, parallel);

    let mut failed = 0;
    for report in &reports {
        if !report.success {
            warn!(file = %report.file, message = %report.message, "import failed");
            failed += 1;
        }
        println!("{}", serde_json::to_string_pretty(report)?);
    }

    Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn cmd_describe(db: &Path, table: &str, registry: Arc<ValueGeneratorRegistry>) -> Result<ExitCode> {
    let importer = Importer::new(db, registry);
    let structure = importer.describe_table(table);
    println!("{}", serde_json::to_string_pretty(&structure)?);
    Ok(if structure.exists { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn cmd_generators(registry: &ValueGeneratorRegistry) -> Result<ExitCode> {
    for generator in registry.descriptors() {
        println!(
            "{:<16} {:<10} {}",
            generator.id,
            generator.value_type.to_string(),
            generator.description
        );
    }
    Ok(ExitCode::SUCCESS)
}
