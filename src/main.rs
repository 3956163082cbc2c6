//! Snapkeep main entry point
//!
//! This is the command-line interface for the Snapkeep site archiver.

use anyhow::Context;
use clap::{Parser, Subcommand};
use snapkeep::config::{load_config_with_hash, Config};
use snapkeep::{CrawlEngine, JobRegistry, JobStatus, MetadataStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Interval between job status polls
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Snapkeep: point-in-time local snapshots of websites
///
/// Snapkeep fetches a page, stores its images, stylesheets and scripts next
/// to it, follows links on the same host up to a page budget, and keeps a
/// per-host history of every snapshot taken.
#[derive(Parser, Debug)]
#[command(name = "snapkeep")]
#[command(version)]
#[command(about = "Point-in-time local snapshots of websites", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Archive a site and wait for the snapshot to finish
    Archive {
        /// Seed URL (http or https)
        url: String,

        /// Maximum number of pages to save
        #[arg(long)]
        max_pages: Option<u32>,

        #[command(flatten)]
        source: ConfigSource,
    },

    /// List the snapshots recorded for a host
    History {
        /// Hostname, as used for the snapshot directory
        host: String,

        #[command(flatten)]
        source: ConfigSource,
    },

    /// Validate a configuration file and show the effective settings
    CheckConfig {
        /// Path to TOML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct ConfigSource {
    /// Path to TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the data directory from the configuration
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

impl ConfigSource {
    fn load(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                let (config, hash) = load_config_with_hash(path)
                    .with_context(|| format!("loading {}", path.display()))?;
                tracing::info!("Configuration loaded successfully (hash: {})", hash);
                config
            }
            None => Config::default(),
        };

        if let Some(dir) = &self.data_dir {
            config.output.data_dir = dir.display().to_string();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Archive {
            url,
            max_pages,
            source,
        } => handle_archive(source.load()?, &url, max_pages).await,
        Command::History { host, source } => handle_history(source.load()?, &host).await,
        Command::CheckConfig { config } => handle_check_config(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("snapkeep=info,warn"),
            1 => EnvFilter::new("snapkeep=debug,info"),
            2 => EnvFilter::new("snapkeep=trace,debug"),
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

/// Submits an archive job and polls it until it finishes
async fn handle_archive(config: Config, url: &str, max_pages: Option<u32>) -> anyhow::Result<()> {
    let engine = CrawlEngine::new(&config)?;
    let registry = JobRegistry::new(Arc::new(engine), config.crawler.default_max_pages);

    let id = registry.submit(url, max_pages)?;
    println!("Job {} submitted for {}", id, url);

    let mut last_progress = None;
    let job = loop {
        let job = registry.get_status(&id)?;
        if job.status.is_terminal() {
            break job;
        }

        if last_progress.as_ref() != Some(&job.progress) {
            println!(
                "  [{}] pages: {}, assets: {}{}",
                job.status,
                job.progress.pages_processed,
                job.progress.assets_downloaded,
                job.progress
                    .current_page_url
                    .as_deref()
                    .map(|u| format!(" - {}", u))
                    .unwrap_or_default()
            );
            last_progress = Some(job.progress.clone());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    match (job.status, job.result, job.error) {
        (JobStatus::Completed, Some(result), _) => {
            println!("\n✓ Snapshot {} complete", result.snapshot_id);
            println!("  Host: {}", result.hostname);
            println!("  Pages: {}", result.page_count);
            println!("  Assets: {}", result.asset_count);
            println!(
                "  Location: {}",
                PathBuf::from(&config.output.data_dir)
                    .join(&result.hostname)
                    .join(&result.snapshot_id)
                    .display()
            );
            Ok(())
        }
        (_, _, error) => {
            anyhow::bail!(
                "job {} failed: {}",
                id,
                error.unwrap_or_else(|| "unknown error".to_string())
            )
        }
    }
}

/// Prints the snapshot history recorded for a host
async fn handle_history(config: Config, host: &str) -> anyhow::Result<()> {
    let store = MetadataStore::new(&config.output.data_dir);
    let entries = store.list(&host.to_ascii_lowercase()).await?;

    if entries.is_empty() {
        println!("No snapshots recorded for {}", host);
        return Ok(());
    }

    println!("Snapshots for {} ({}):\n", host, entries.len());
    for entry in &entries {
        println!(
            "  {}  pages: {:>4}  assets: {:>5}  {}",
            entry.snapshot_id, entry.page_count, entry.asset_count, entry.source_url
        );
    }

    Ok(())
}

/// Validates a config file and shows the effective settings
fn handle_check_config(path: &Path) -> anyhow::Result<()> {
    let (config, hash) =
        load_config_with_hash(path).with_context(|| format!("loading {}", path.display()))?;

    println!("=== Snapkeep Configuration ===\n");
    println!("File: {} (hash: {})", path.display(), &hash[..12.min(hash.len())]);

    println!("\nCrawler:");
    println!("  Default max pages: {}", config.crawler.default_max_pages);
    println!("  Page timeout: {}s", config.crawler.page_timeout_secs);
    println!("  Asset timeout: {}s", config.crawler.asset_timeout_secs);
    println!("  Delay between pages: {}ms", config.crawler.page_delay_ms);
    println!("  Delay between assets: {}ms", config.crawler.asset_delay_ms);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.value);

    println!("\nOutput:");
    println!("  Data directory: {}", config.output.data_dir);

    println!(
        "\nSkip Rules (built-in {}, {} custom):",
        if config.classifier.use_defaults {
            "enabled"
        } else {
            "disabled"
        },
        config.classifier.rules.len()
    );
    for rule in &config.classifier.rules {
        println!("  - [{}] {}", rule.category, rule.pattern);
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}
