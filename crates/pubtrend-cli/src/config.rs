use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::LazyLock;

static VERSION_INFO: LazyLock<String> = LazyLock::new(|| {
    let version = env!("CARGO_PKG_VERSION");

    let commit = option_env!("VERGEN_GIT_SHA")
        .map(|s| s.chars().take(7).collect::<String>())
        .unwrap_or_else(|| "unknown".to_string());

    let built = option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown"); // YYYY-MM-DD
    let target = option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown");
    let rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown");

    format!("{version}\ncommit: {commit}\nbuilt: {built}\ntarget: {target}\nrustc: {rustc}")
});

pub fn version_info() -> &'static str {
    &VERSION_INFO
}

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "pubtrend")]
#[command(
    author,
    version = version_info(),
    about = "Monthly arXiv publication counts, harvested over OAI-PMH"
)]
#[command(after_help = "Examples:
  pubtrend sync full --start-year 2022
  pubtrend sync quick
  pubtrend counts cs.AI
  pubtrend trends --limit 5
  pubtrend checkpoint show

Settings are read from ~/.config/pubtrend/pubtrend.toml (created on first use).")]
pub struct Config {
    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = pubtrend_db::DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Custom path to pubtrend.toml
    #[arg(short, long, env = "PUBTREND_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the checkpoint file location
    #[arg(long, env = "PUBTREND_CHECKPOINT", value_name = "PATH")]
    pub checkpoint: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Harvest counts from the repository
    Sync {
        #[command(subcommand)]
        mode: SyncMode,
    },
    /// Show stored monthly counts for a category
    #[command(after_help = "Example: pubtrend counts cs.AI --all")]
    Counts {
        /// Category id (e.g. cs.AI)
        category: String,
        /// Include months that look incomplete
        #[arg(long)]
        all: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show trend statistics for a category
    Stats {
        /// Category id (e.g. cs.AI)
        category: String,
    },
    /// Rank categories by long-term growth
    #[command(after_help = "Examples:
  pubtrend trends                  # top 10 growing categories
  pubtrend trends --declining      # fastest shrinking first
  pubtrend trends --group cs       # only Computer Science")]
    Trends {
        /// Restrict to one top-level group (e.g. cs)
        #[arg(short, long)]
        group: Option<String>,
        /// Maximum number of categories to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Lowest growth first
        #[arg(long)]
        declining: bool,
    },
    /// List tracked categories
    Categories,
    /// Inspect or remove the sync checkpoint
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },
    /// Show when the last syncs finished
    LastSync,
}

/// Sync run types
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// Harvest everything from the start year to the current month
    #[command(after_help = "Examples:
  pubtrend sync full                   # resume an interrupted run if there is one
  pubtrend sync full --no-resume       # start over
  pubtrend sync full --start-year 2020")]
    Full {
        /// First year to harvest (defaults to the configured start_year)
        #[arg(long, value_name = "YEAR")]
        start_year: Option<i32>,
        /// Ignore any saved checkpoint
        #[arg(long)]
        no_resume: bool,
    },
    /// Refresh the last few months only
    Quick,
}

/// Checkpoint actions
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointAction {
    /// Print the saved checkpoint
    Show,
    /// Delete the saved checkpoint
    Clear,
}
