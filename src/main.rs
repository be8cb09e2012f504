//! amz-used-watch - Amazon used/open-box listing watcher
//!
//! Scrapes warehouse-deal results and notifies on new listings and price drops.

use amz_used_watch::amazon::regions::Region;
use amz_used_watch::commands::{HistoryCommand, RunCommand};
use amz_used_watch::config::{Config, OutputFormat};
use amz_used_watch::format::Formatter;
use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "amz-used-watch",
    version,
    about = "Watch Amazon used/open-box listings and get notified on price drops",
    long_about = "Scrapes Amazon warehouse-deal search results, keeps a price history per listing, \
                  and sends notifications for new listings and significant price drops."
)]
struct Cli {
    /// Amazon region to scrape
    #[arg(short, long, global = true)]
    region: Option<Region>,

    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, global = true, env = "AMZ_PROXY")]
    proxy: Option<String>,

    /// Delay between pages in milliseconds
    #[arg(long, global = true, env = "AMZ_DELAY")]
    delay: Option<u64>,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape configured sources and send notifications
    #[command(alias = "r")]
    Run {
        /// Only scrape these sources (repeatable)
        #[arg(short, long = "source")]
        sources: Vec<String>,

        /// Minimum price drop in percent that triggers a notification
        #[arg(long)]
        min_discount: Option<Decimal>,

        /// Keep history in memory only for this run
        #[arg(long)]
        no_history: bool,

        /// Sources scraped at the same time
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Inspect or reset the price history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// List supported regions
    Regions,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List stored entries, newest first
    Show {
        /// Maximum number of entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Delete every stored entry
    Reset,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env()?;

    // Apply CLI overrides
    if let Some(region) = cli.region {
        config.region = region;
    }
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(delay) = cli.delay {
        config.delay_ms = delay;
    }
    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }

    match cli.command {
        Commands::Run { sources, min_discount, no_history, concurrency } => {
            if let Some(min_discount) = min_discount {
                config.min_discount_percent = min_discount;
            }
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            if no_history {
                config.use_history = false;
            }

            let formatter = Formatter::new(config.format);
            let summary = RunCommand::new(config).only(sources).execute().await?;
            println!("{}", formatter.format_summary(&summary));

            if !summary.is_clean() {
                return Ok(ExitCode::from(2));
            }
        }

        Commands::History { action } => {
            let cmd = HistoryCommand::new(config);
            let output = match action {
                HistoryAction::Show { limit } => cmd.show(limit).await?,
                HistoryAction::Reset => cmd.reset().await?,
            };
            println!("{}", output);
        }

        Commands::Regions => {
            println!("Supported Amazon regions:\n");
            println!("{:<6} {:<20} {:<10}", "Code", "Domain", "Currency");
            println!("{:-<6} {:-<20} {:-<10}", "", "", "");

            for region in Region::all() {
                println!(
                    "{:<6} {:<20} {:<10}",
                    region.to_string(),
                    region.domain(),
                    region.currency()
                );
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
