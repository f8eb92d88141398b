use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, warn};

use export_cleaner::config::Config;
use export_cleaner::constants;
use export_cleaner::error::CleanerError;
use export_cleaner::logging;
use export_cleaner::pipeline::{self, RunOptions};
use export_cleaner::profiles::ProfileRegistry;
use export_cleaner::sink::{CsvFileSink, TableSink};
use export_cleaner::types::CleaningMode;
use export_cleaner::warehouse::WarehouseSink;

#[derive(Parser)]
#[command(name = "export_cleaner")]
#[command(about = "Normalizes ad-hoc export CSV files and loads them into the warehouse")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean a single export file
    Clean {
        /// Path to the raw export CSV
        input: PathBuf,
        /// Source profile to clean with (see `sources` for the list)
        #[arg(long)]
        profile: String,
        /// Logical table name; defaults to the input file stem
        #[arg(long)]
        table: Option<String>,
        /// Override the profile's failure policy
        #[arg(long, value_enum)]
        mode: Option<CleaningMode>,
        /// Load the cleaned table into the warehouse after writing the artifact
        #[arg(long)]
        upload: bool,
        /// Directory for cleaned artifacts (defaults to config)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Clean the three conventional weekly export files from a folder
    Batch {
        /// Folder containing the weekly export drop
        #[arg(long)]
        dir: PathBuf,
        /// Week label prefixed onto artifact names, e.g. week1
        #[arg(long)]
        week: String,
        /// Load each cleaned table into the warehouse
        #[arg(long)]
        upload: bool,
    },
    /// List the available source profiles
    Sources,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;
    let mut registry = ProfileRegistry::new();
    registry.extend_from_config(&config.profiles, config.cleaning.default_mode)?;

    match cli.command {
        Commands::Clean {
            input,
            profile,
            table,
            mode,
            upload,
            output_dir,
        } => {
            let profile = registry.get(&profile)?;
            let options = RunOptions {
                table_name: table.unwrap_or_else(|| default_table_name(&input)),
                mode: mode.unwrap_or(profile.mode),
                anomaly_log: anomaly_log_path(&config),
            };
            let output_dir =
                output_dir.unwrap_or_else(|| PathBuf::from(&config.cleaning.output_dir));
            let mut artifact = CsvFileSink::new(output_dir);
            let mut warehouse = build_warehouse(&config, upload)?;
            let warehouse_ref = warehouse.as_mut().map(|w| w as &mut dyn TableSink);

            match pipeline::clean_file(profile, &input, &options, &mut artifact, warehouse_ref) {
                Ok(_) => {
                    println!("✅ Clean completed successfully");
                }
                Err(e) => {
                    if let CleanerError::SourceUnavailable { .. } = e {
                        error!("{}", e);
                        println!("❌ The file was not found: {}", input.display());
                    }
                    return Err(e.into());
                }
            }
        }
        Commands::Batch { dir, week, upload } => {
            run_batch(&registry, &config, &dir, &week, upload)?;
        }
        Commands::Sources => {
            println!("📋 Available source profiles:");
            for profile in registry.list() {
                println!(
                    "   {:<22} {:>3} columns  {:<8} {} column rules",
                    profile.name,
                    profile.expected_columns,
                    profile.mode,
                    profile.rules.len()
                );
            }
        }
    }
    Ok(())
}

/// Walk the weekly drop folder: each conventional file goes through its own
/// profile, and one file's failure does not stop the others.
fn run_batch(
    registry: &ProfileRegistry,
    config: &Config,
    dir: &Path,
    week: &str,
    upload: bool,
) -> anyhow::Result<()> {
    println!("🔄 Running weekly batch '{}' from {}", week, dir.display());
    let mut artifact = CsvFileSink::new(config.cleaning.output_dir.clone());
    let mut warehouse = build_warehouse(config, upload)?;
    let mut failures = 0;

    for (file_name, profile_name) in constants::batch_manifest() {
        let input = dir.join(file_name);
        if !input.exists() {
            warn!("Batch file '{}' not found, skipping", input.display());
            println!("⚠️  {} not found, skipping", file_name);
            continue;
        }
        let profile = registry.get(profile_name)?;
        let stem = file_name.strip_suffix(".csv").unwrap_or(file_name);
        let options = RunOptions {
            table_name: format!("{} {}", week, stem),
            mode: profile.mode,
            anomaly_log: anomaly_log_path(config),
        };
        let warehouse_ref = warehouse.as_mut().map(|w| w as &mut dyn TableSink);

        match pipeline::clean_file(profile, &input, &options, &mut artifact, warehouse_ref) {
            Ok(_) => {
                println!("✅ Finished {}", file_name);
            }
            Err(e) => {
                failures += 1;
                error!("Error processing {}: {}", file_name, e);
                println!("❌ Error processing {}: {}", file_name, e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} batch file(s) failed", failures);
    }
    println!("✅ Weekly batch completed");
    Ok(())
}

fn build_warehouse(config: &Config, upload: bool) -> anyhow::Result<Option<WarehouseSink>> {
    if !upload {
        return Ok(None);
    }
    if config.warehouse.endpoint.is_empty() {
        warn!("Upload requested but no warehouse endpoint is configured");
        println!("⚠️  Upload requested but [warehouse].endpoint is not set; skipping upload");
        return Ok(None);
    }
    Ok(Some(WarehouseSink::new(&config.warehouse)?))
}

fn default_table_name(input: &Path) -> String {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("cleaned_export")
        .to_string()
}

fn anomaly_log_path(config: &Config) -> Option<PathBuf> {
    if config.cleaning.anomaly_log.is_empty() {
        None
    } else {
        Some(PathBuf::from(&config.cleaning.anomaly_log))
    }
}
