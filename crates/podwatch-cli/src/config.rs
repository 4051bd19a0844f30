use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::LazyLock;

static VERSION_INFO: LazyLock<String> = LazyLock::new(|| {
    let version = env!("CARGO_PKG_VERSION");

    let commit = option_env!("VERGEN_GIT_SHA")
        .map(|s| s.chars().take(7).collect::<String>())
        .unwrap_or_else(|| "unknown".to_string());

    let built = option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown");
    let target = option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown");
    let rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown");

    format!("{version}\ncommit: {commit}\nbuilt: {built}\ntarget: {target}\nrustc: {rustc}")
});

pub fn version_info() -> &'static str {
    &VERSION_INFO
}

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "podwatch")]
#[command(
    author,
    version = version_info(),
    about = "Inventory and analytics for pNode storage networks"
)]
#[command(after_help = "Examples:
  podwatch ingest
  podwatch nodes --refresh --limit 20
  podwatch nodes --country DE --tier excellent
  podwatch metrics
  podwatch notifications --limit 10

Seeds are read from ~/.config/podwatch/network.toml (created on first run).")]
pub struct Config {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Custom path to network.toml
    #[arg(long, env = "NETWORK_CONFIG", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Query every enabled seed once and store the enriched nodes
    Ingest,
    /// Show ranked nodes
    #[command(after_help = "Examples:
  podwatch nodes                    # Stored rows, as last ingested
  podwatch nodes --refresh          # Re-ingest first if the data is stale
  podwatch nodes --status offline   # Only offline nodes")]
    Nodes {
        /// Go through the staleness-checked read path (may run ingestion)
        #[arg(long)]
        refresh: bool,
        /// Maximum number of nodes to show
        #[arg(short, long, default_value = "25")]
        limit: usize,
        /// Filter by status: online or offline
        #[arg(long)]
        status: Option<String>,
        /// Filter by ISO country code
        #[arg(long)]
        country: Option<String>,
        /// Filter by tier: excellent, good, fair or poor
        #[arg(long)]
        tier: Option<String>,
    },
    /// Show the latest network aggregate
    Network,
    /// Show decentralization, health, censorship resistance and top X-scores
    Metrics {
        /// Number of X-scores to list
        #[arg(short, long, default_value = "10")]
        top: usize,
    },
    /// Show recent node lifecycle notifications
    Notifications {
        /// Maximum number of notifications to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}
