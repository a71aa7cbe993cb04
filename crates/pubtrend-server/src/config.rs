use clap::Parser;
use std::path::PathBuf;

/// Server configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug, Clone)]
#[command(name = "pubtrend-server")]
#[command(author, version, about = "REST API and daily sync scheduler for pubtrend")]
pub struct ServerConfig {
    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = pubtrend_db::DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Server port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Path to pubtrend.toml
    #[arg(long, env = "PUBTREND_CONFIG")]
    pub config: Option<PathBuf>,

    /// Allowed CORS origins, comma separated, or "*"
    #[arg(long, env = "CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// UTC hour of the daily quick sync
    #[arg(
        long,
        env = "PUBTREND_SYNC_HOUR",
        default_value = "6",
        value_parser = clap::value_parser!(u32).range(0..24)
    )]
    pub sync_hour: u32,

    /// Do not run the daily quick sync
    #[arg(long, env = "PUBTREND_NO_SCHEDULER")]
    pub no_scheduler: bool,
}
