//! Binary entry point for memsweep.
//!
//! This binary provides the CLI interface for sweeping stale memories.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use memsweep::config::{SweepConfig, parse_model_list};
use memsweep::gc::{MemorySweeper, RetentionPolicy};
use memsweep::models::{ClassificationAttempt, FilterRequest, MemoryId};
use memsweep::observability;
use memsweep::storage::{MemoryStore, OpenMemoryClient};
use memsweep::{ClassificationService, Error, FanOutCoordinator, calculate_consensus};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Memsweep - retires stale memories by multi-model consensus.
#[derive(Parser)]
#[command(name = "memsweep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "MEMSWEEP_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Classify every memory and delete the transient ones.
    Sweep {
        /// Report what would be deleted without deleting anything.
        #[arg(long)]
        dry_run: bool,

        /// Minimum consensus confidence for deletion (0.0 to 1.0).
        #[arg(long)]
        threshold: Option<f32>,

        /// Memories fetched per page.
        #[arg(long)]
        page_size: Option<u32>,

        /// Stop after classifying this many memories.
        #[arg(long)]
        max_records: Option<usize>,

        /// Classifier models (comma-separated).
        #[arg(long)]
        models: Option<String>,
    },

    /// Classify a piece of text without touching the store.
    Classify {
        /// The content to classify.
        content: String,

        /// Classifier models (comma-separated).
        #[arg(long)]
        models: Option<String>,

        /// Print the consensus as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List memories in the store.
    List {
        /// Page number (1-based).
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Page size.
        #[arg(short, long, default_value = "25")]
        size: u32,
    },

    /// Show the effective configuration, secrets redacted.
    Config,
}

/// Main entry point.
fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let _observability = match observability::init_from_config(&config.observability, cli.verbose)
    {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: SweepConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Sweep {
            dry_run,
            threshold,
            page_size,
            max_records,
            models,
        } => cmd_sweep(config, dry_run, threshold, page_size, max_records, models),

        Commands::Classify {
            content,
            models,
            json,
        } => cmd_classify(config, &content, models, json),

        Commands::List { page, size } => cmd_list(&config, page, size),

        Commands::Config => cmd_config(&config),
    }
}

/// Loads configuration: file first, then environment.
fn load_config(path: Option<&std::path::Path>) -> memsweep::Result<SweepConfig> {
    let config = match path {
        Some(path) => SweepConfig::load_from_file(path)?,
        None => SweepConfig::load_default()?,
    };
    Ok(config.with_env_overrides())
}

/// Sweep command.
fn cmd_sweep(
    mut config: SweepConfig,
    dry_run: bool,
    threshold: Option<f32>,
    page_size: Option<u32>,
    max_records: Option<usize>,
    models: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(threshold) = threshold {
        config.retention.delete_threshold = threshold;
    }
    if let Some(page_size) = page_size {
        config.retention.page_size = page_size;
    }
    if max_records.is_some() {
        config.retention.max_records = max_records;
    }
    if let Some(models) = models {
        config.llm.models = parse_model_list(&models);
    }
    config.validate()?;

    let sweeper = MemorySweeper::from_config(&config)?;
    if dry_run {
        println!("Dry run: no memories will be deleted");
    }
    println!(
        "Sweeping with {} models, delete threshold {}",
        sweeper.model_ids().len(),
        config.retention.delete_threshold
    );

    let result = sweeper.sweep(dry_run)?;
    println!("{}", result.summary());
    if result.classifier_failures > 0 {
        println!("{} classifier attempts failed", result.classifier_failures);
    }

    Ok(())
}

/// Classify command.
fn cmd_classify(
    mut config: SweepConfig,
    content: &str,
    models: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(models) = models {
        config.llm.models = parse_model_list(&models);
    }
    if config.llm.api_key.is_none() {
        return Err(Error::Config("OPENAI_API_KEY not set".to_string()).into());
    }
    config.validate_settings()?;

    let service = ClassificationService::from_config(&config.llm);
    let coordinator = FanOutCoordinator::new(Arc::new(service));
    let consensus = calculate_consensus(coordinator.classify_all(&config.llm.models, content));
    if consensus.credentials_rejected() {
        return Err(Error::Unauthorized(
            "every classifier rejected the configured API key".to_string(),
        )
        .into());
    }
    let action = RetentionPolicy::new(config.retention.delete_threshold)
        .decide(&MemoryId::new("cli"), &consensus);

    if json {
        println!("{}", serde_json::to_string_pretty(&consensus)?);
        return Ok(());
    }

    for attempt in &consensus.attempts {
        match attempt {
            ClassificationAttempt::Success { model_id, result } => {
                println!(
                    "  {model_id}: {} ({:.2}) {}",
                    result.verdict, result.confidence, result.reasoning
                );
            },
            ClassificationAttempt::Failure { model_id, error, .. } => {
                println!("  {model_id}: failed: {error}");
            },
        }
    }
    println!(
        "Consensus: {} (confidence {:.2}, {} succeeded, {} failed)",
        consensus.final_verdict,
        consensus.confidence,
        consensus.successful_count,
        consensus.failed_count
    );
    println!(
        "Decision: {}",
        if action.is_delete() { "delete" } else { "retain" }
    );

    Ok(())
}

/// List command.
fn cmd_list(config: &SweepConfig, page: u32, size: u32) -> Result<(), Box<dyn std::error::Error>> {
    let store = OpenMemoryClient::from_config(&config.store)?;
    let request = FilterRequest::default().with_page(page).with_size(size);
    let listing = store.fetch_page(&request)?;

    for record in &listing.items {
        let preview: String = record.content.chars().take(80).collect();
        println!(
            "{}  {}  {preview}",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!(
        "Page {} of {} ({} memories)",
        listing.page, listing.pages, listing.total
    );

    Ok(())
}

/// Config command.
fn cmd_config(config: &SweepConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = SweepConfig::default_path() {
        println!("# default config file: {}", path.display());
    }
    print!("{config}");
    Ok(())
}
