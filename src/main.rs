//! policy-crawler main entry point
//!
//! This is the command-line interface over the source registry and the crawl
//! job orchestrator.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use policy_crawler::config::{load_config_with_hash, Config};
use policy_crawler::model::{Country, Frequency, JobStatus, Sector, SourceDraft, SourceKind};
use policy_crawler::output::{
    load_statistics, print_statistics, render_job, render_jobs, render_sources,
};
use policy_crawler::storage::open_storage;
use policy_crawler::Orchestrator;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// policy-crawler: crawl jobs for regulatory and market sources
///
/// Registers sources (regulators, exchanges, gazettes), runs on-demand crawl
/// jobs against them, and stores deduplicated documents with extracted
/// data points.
#[derive(Parser, Debug)]
#[command(name = "policy-crawler")]
#[command(version)]
#[command(about = "Crawl job orchestrator for policy and regulatory sources", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new source
    AddSource {
        #[arg(long)]
        name: String,

        #[arg(long)]
        url: String,

        /// PH, SG, MY, ID or TH
        #[arg(long)]
        country: Country,

        /// power, finance, re or other
        #[arg(long)]
        sector: Sector,

        /// daily, weekly, monthly or ad-hoc
        #[arg(long, default_value = "weekly")]
        frequency: Frequency,

        /// exchange, gazette, policy, regulator, news or general
        #[arg(long, default_value = "general")]
        kind: SourceKind,
    },

    /// List registered sources
    Sources,

    /// Re-enable a source
    Activate { source_id: i64 },

    /// Disable a source; its history is kept
    Deactivate { source_id: i64 },

    /// Change the informational crawl frequency of a source
    SetFrequency {
        source_id: i64,
        frequency: Frequency,
    },

    /// Run a crawl job and follow it until it finishes
    Crawl {
        source_id: i64,

        /// Seconds between status polls
        #[arg(long, default_value_t = 2)]
        poll_secs: u64,
    },

    /// Show one crawl job
    Status { job_id: i64 },

    /// List crawl jobs, newest first
    Jobs,

    /// Fail jobs left unfinished by a crashed or killed process
    Recover,

    /// Show ingestion statistics
    Stats,

    /// Validate the configuration and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Command::CheckConfig = cli.command {
        print_config(&config);
        return Ok(());
    }

    let storage = open_storage(Path::new(&config.storage.database_path))
        .with_context(|| format!("Failed to open {}", config.storage.database_path))?;
    let storage = Arc::new(Mutex::new(storage));
    let orchestrator = Orchestrator::new(&config, Arc::clone(&storage))?;

    match cli.command {
        Command::AddSource {
            name,
            url,
            country,
            sector,
            frequency,
            kind,
        } => {
            let source = orchestrator.create_source(SourceDraft {
                name,
                url,
                country,
                sector,
                frequency,
                kind,
            })?;
            println!("Registered source {}: {} <{}>", source.id, source.name, source.url);
        }
        Command::Sources => print!("{}", render_sources(&orchestrator.list_sources()?)),
        Command::Activate { source_id } => {
            let source = orchestrator.set_source_active(source_id, true)?;
            println!("Source {} is active", source.id);
        }
        Command::Deactivate { source_id } => {
            let source = orchestrator.set_source_active(source_id, false)?;
            println!("Source {} is inactive", source.id);
        }
        Command::SetFrequency {
            source_id,
            frequency,
        } => {
            let source = orchestrator.update_source_frequency(source_id, frequency)?;
            println!("Source {} is now crawled {}", source.id, source.frequency);
        }
        Command::Crawl {
            source_id,
            poll_secs,
        } => handle_crawl(&orchestrator, source_id, poll_secs).await?,
        Command::Status { job_id } => print!("{}", render_job(&orchestrator.job_status(job_id)?)),
        Command::Jobs => print!("{}", render_jobs(&orchestrator.list_jobs()?)),
        Command::Recover => {
            let recovered = orchestrator.recover_interrupted_jobs()?;
            println!("Recovered {} interrupted job(s)", recovered.len());
        }
        Command::Stats => {
            println!("Database: {}\n", config.storage.database_path);
            let stats = {
                let storage = storage
                    .lock()
                    .map_err(|_| anyhow::anyhow!("storage lock poisoned"))?;
                load_statistics(&*storage)?
            };
            print_statistics(&stats);
        }
        // handled before storage is opened
        Command::CheckConfig => {}
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("policy_crawler=info,warn"),
            1 => EnvFilter::new("policy_crawler=debug,info"),
            2 => EnvFilter::new("policy_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn print_config(config: &Config) {
    println!("=== Configuration ===\n");

    println!("Crawler:");
    println!(
        "  Max concurrent items: {}",
        config.crawler.max_concurrent_items
    );
    println!("  Max items per job: {}", config.crawler.max_items_per_job);
    match config.crawler.job_deadline_secs {
        Some(secs) => println!("  Job deadline: {}s", secs),
        None => println!("  Job deadline: none"),
    }

    println!("\nFetcher:");
    println!(
        "  Request timeout: {}s (connect {}s)",
        config.fetcher.request_timeout_secs, config.fetcher.connect_timeout_secs
    );
    println!(
        "  Retries: {} (backoff {}ms, max {}ms)",
        config.fetcher.max_retries, config.fetcher.backoff_base_ms, config.fetcher.max_backoff_ms
    );

    println!("\nUser Agent: {}", config.user_agent.header_value());
    println!("\nDatabase: {}", config.storage.database_path);

    println!("\n✓ Configuration is valid");
}

/// Starts a job and polls it until it reaches a terminal state
///
/// Ctrl-C requests cancellation; the job still finishes through `failed`.
async fn handle_crawl(
    orchestrator: &Orchestrator,
    source_id: i64,
    poll_secs: u64,
) -> anyhow::Result<()> {
    let job = orchestrator.start_job(source_id).await?;
    println!("Started crawl job {} for source {}", job.id, source_id);

    let interval = Duration::from_secs(poll_secs.max(1));
    let mut last_seen = (job.items_crawled, job.items_new);
    let mut cancel_requested = false;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c(), if !cancel_requested => {
                cancel_requested = true;
                orchestrator.cancel_job(job.id)?;
                println!("Cancelling job {}...", job.id);
                continue;
            }
        }

        let current = orchestrator.job_status(job.id)?;
        if current.is_terminal() {
            print!("{}", render_job(&current));
            if current.status == JobStatus::Failed {
                bail!(
                    "crawl job {} failed: {}",
                    current.id,
                    current.error_message.unwrap_or_default()
                );
            }
            return Ok(());
        }

        let progress = (current.items_crawled, current.items_new);
        if progress != last_seen {
            println!(
                "  {} item(s) crawled, {} new",
                current.items_crawled, current.items_new
            );
            last_seen = progress;
        }
    }
}
