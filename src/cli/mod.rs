pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "life-news")]
#[command(about = "News feed aggregator with Web Push notifications", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/life-news/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API
    Serve {
        /// Also run notifications on this interval (e.g., "1h", "30m", "1d")
        #[arg(short, long)]
        interval: Option<String>,

        /// Skip the run at startup when an interval is set
        #[arg(long)]
        no_initial_run: bool,
    },
    /// Run the notification job once and print the summary
    Run,
    /// List configured sources
    Sources,
    /// Fetch all sources and show the newest items
    Fetch {
        /// Number of items to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Remove old notified item records
    Cleanup {
        /// Age in days (default: retention.notified_item_days)
        #[arg(short, long)]
        days: Option<i64>,
    },
    /// List stored push subscriptions
    Subscriptions,
    /// VAPID key management
    Vapid {
        #[command(subcommand)]
        action: VapidAction,
    },
}

#[derive(Subcommand)]
pub enum VapidAction {
    /// Generate a new key pair
    Generate {
        /// Contact URI for push services
        #[arg(short, long, default_value = "mailto:admin@example.com")]
        subject: String,

        /// Print as JSON instead of environment lines
        #[arg(long)]
        json: bool,
    },
    /// Validate the configured keys
    Check,
}
