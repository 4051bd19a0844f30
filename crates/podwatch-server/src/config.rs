use clap::Parser;
use std::path::PathBuf;

/// Server configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "podwatch-server")]
#[command(author, version, about = "REST API server for podwatch pNode analytics")]
pub struct ServerConfig {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Server port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Path to network.toml (pRPC seeds and external API endpoints)
    #[arg(long, env = "NETWORK_CONFIG")]
    pub network_config: Option<PathBuf>,

    /// Bearer token for admin endpoints. Admin endpoints are disabled when unset.
    #[arg(long, env = "PODWATCH_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Allowed CORS origins, comma-separated, or "*" for any
    #[arg(long, env = "CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Sustained requests per second allowed per client IP
    #[arg(long, env = "RATE_LIMIT_RPS", default_value = "10")]
    pub rate_limit_rps: u32,

    /// Burst size allowed per client IP
    #[arg(long, env = "RATE_LIMIT_BURST", default_value = "30")]
    pub rate_limit_burst: u32,

    /// Seconds between background staleness checks (0 disables the refresher)
    #[arg(long, env = "REFRESH_INTERVAL_SECS", default_value = "60")]
    pub refresh_interval_secs: u64,
}
