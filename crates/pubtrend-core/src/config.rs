//! Configuration types for pubtrend components.
//!
//! Every section has a `Default` that matches the arXiv endpoint's published
//! politeness rules. An optional TOML file overrides any subset of fields;
//! binaries layer CLI flags and environment variables on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AppError;

/// Serde helper storing a `Duration` as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

// =============================================================================
// HTTP
// =============================================================================

/// HTTP client configuration for the OAI-PMH endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout. OAI-PMH list pages can take a long time.
    #[serde(rename = "timeout_secs", with = "duration_secs")]
    pub timeout: Duration,
    #[serde(rename = "connect_timeout_secs", with = "duration_secs")]
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(30),
            user_agent: format!("pubtrend/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

// =============================================================================
// Retry
// =============================================================================

/// Retry behavior for a single page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    #[serde(rename = "base_delay_secs", with = "duration_secs")]
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-based): `base × 2^attempt`.
    ///
    /// - Attempt 0: 5 s
    /// - Attempt 1: 10 s
    /// - Attempt 4: 80 s
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }
}

// =============================================================================
// Harvest
// =============================================================================

/// Checkpoint file name used when no explicit path is configured.
pub const CHECKPOINT_FILE_NAME: &str = "sync_checkpoint.json";

/// What to harvest and how politely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// OAI-PMH endpoint.
    pub base_url: String,
    pub metadata_prefix: String,
    /// Fixed pause between consecutive requests.
    #[serde(rename = "rate_limit_secs", with = "duration_secs")]
    pub rate_limit: Duration,
    /// First year covered by a full sync.
    pub start_year: i32,
    /// Months covered by a quick sync, current month included.
    pub quick_months: u32,
    pub checkpoint_path: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://export.arxiv.org/oai2".to_string(),
            metadata_prefix: "oai_dc".to_string(),
            rate_limit: Duration::from_secs(3),
            start_year: 2022,
            quick_months: 3,
            checkpoint_path: default_checkpoint_path(),
        }
    }
}

/// The whole settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub harvest: HarvestConfig,
    pub http: HttpConfig,
    pub retry: RetryPolicy,
}

// =============================================================================
// File locations
// =============================================================================

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "pubtrend.toml";

/// Returns the default configuration directory path.
///
/// Uses XDG Base Directory specification: `~/.config/pubtrend/`
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pubtrend"))
}

/// Returns the default configuration file path.
///
/// Path: `~/.config/pubtrend/pubtrend.toml`
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join(CONFIG_FILE_NAME))
}

/// `~/.local/share/pubtrend/sync_checkpoint.json`, or the working directory
/// when no data directory is known.
pub fn default_checkpoint_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("pubtrend").join(CHECKPOINT_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CHECKPOINT_FILE_NAME))
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# pubtrend configuration
#
# Every key is optional; anything left out keeps its built-in default.

[harvest]
# base_url = "https://export.arxiv.org/oai2"
# metadata_prefix = "oai_dc"
# Pause between consecutive requests. arXiv asks for at least 3 seconds.
# rate_limit_secs = 3
# First year covered by `pubtrend sync full`.
# start_year = 2022
# Months covered by `pubtrend sync quick`, current month included.
# quick_months = 3
# checkpoint_path = "/var/lib/pubtrend/sync_checkpoint.json"

[http]
# timeout_secs = 120
# connect_timeout_secs = 30

[retry]
# max_retries = 5
# base_delay_secs = 5
"#;

/// Load settings from a TOML file.
///
/// # Arguments
/// * `path` - Optional custom path. If `None`, uses default XDG path.
///
/// # Returns
/// * `Ok(settings)` - File loaded, or defaults when no file exists at the
///   default location
/// * `Err(e)` - A custom path does not exist, or the file is invalid
///
/// # Behavior
/// If no configuration file exists at the default path, a commented
/// template is written there so users can discover the available keys.
pub fn load_settings(path: Option<PathBuf>) -> Result<Settings, AppError> {
    let using_default_path = path.is_none();
    let config_path = match path {
        Some(p) => p,
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(Settings::default()),
        },
    };

    if !config_path.exists() {
        if using_default_path {
            if let Err(e) = create_default_config(&config_path) {
                tracing::warn!("Could not create default config template: {}", e);
            }
            return Ok(Settings::default());
        }
        return Err(AppError::ConfigError(format!(
            "Config file not found: {}",
            config_path.display()
        )));
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        AppError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    parse_settings(&content).map_err(|e| match e {
        AppError::ConfigError(msg) => {
            AppError::ConfigError(format!("{} ({})", msg, config_path.display()))
        }
        other => other,
    })
}

/// Parses and validates settings from TOML text.
pub fn parse_settings(content: &str) -> Result<Settings, AppError> {
    let settings: Settings = toml::from_str(content)
        .map_err(|e| AppError::ConfigError(format!("Invalid TOML: {}", e)))?;

    if settings.harvest.quick_months == 0 {
        return Err(AppError::ConfigError(
            "harvest.quick_months must be at least 1".to_string(),
        ));
    }
    if !(1991..=9999).contains(&settings.harvest.start_year) {
        return Err(AppError::ConfigError(format!(
            "harvest.start_year {} is out of range",
            settings.harvest.start_year
        )));
    }

    Ok(settings)
}

fn create_default_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    tracing::info!("Created default config template at: {}", path.display());

    Ok(())
}
