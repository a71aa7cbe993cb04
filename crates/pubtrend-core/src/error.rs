use thiserror::Error;

use crate::models::OaiErrorCode;

/// Application-wide error types.
///
/// This enum represents all possible errors that can occur while harvesting,
/// aggregating and persisting publication counts. It uses the `thiserror`
/// crate for ergonomic error handling and automatic conversion from
/// underlying library errors.
///
/// # Error Conversion
///
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// Transport implementations classify their own failures into
/// [`AppError::Timeout`], [`AppError::NetworkError`], [`AppError::ServiceBusy`]
/// and [`AppError::ClientError`] so that the retry loop can decide what to do
/// without knowing which HTTP stack produced them.
///
/// # Examples
///
/// ```no_run
/// use pubtrend_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::Generic("Something went wrong".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// Wraps all errors from SQLx, including connection failures, query
    /// errors and constraint violations.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// HTTP request failed with a non-success status or an unusable reply.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// Network or connection error.
    ///
    /// DNS failures, refused connections, resets mid-body.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The remote service asked us to back off (HTTP 429 or 503).
    ///
    /// `retry_after_secs` carries the `Retry-After` header when the server
    /// sent one in delta-seconds form.
    #[error("Service busy (HTTP {status})")]
    ServiceBusy {
        status: u16,
        retry_after_secs: Option<u64>,
    },

    /// The response body could not be parsed as an OAI-PMH document.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The repository answered with an OAI-PMH `<error>` element other than
    /// `noRecordsMatch`.
    ///
    /// These are semantic errors and are never retried.
    #[error("OAI-PMH error {code}: {message}")]
    Protocol { code: OaiErrorCode, message: String },

    /// A page could not be fetched after exhausting the retry budget.
    #[error("Page unavailable for set '{set}' after {attempts} attempts: {last_error}")]
    PageUnavailable {
        set: String,
        attempts: u32,
        last_error: String,
    },

    /// Another sync run holds the process-wide sync slot.
    #[error("A sync is already running")]
    SyncAlreadyRunning,

    /// The run was cancelled through its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// Reading or writing the checkpoint file failed.
    #[error("Checkpoint error: {0}")]
    CheckpointError(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The category id is not part of the set mapping.
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    /// Configuration file error.
    ///
    /// Reading or parsing the TOML settings failed, or a mapping table was
    /// inconsistent.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic application error for cases not covered by specific variants.
    ///
    /// Use this sparingly - prefer creating specific error variants
    /// for better error handling and debugging.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("unable to open") {
                    "Cannot open the database file.\n   Check DATABASE_URL and directory permissions."
                        .to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   The repository may be overloaded. Try again later.",
                    secs
                )
            }
            AppError::ServiceBusy {
                retry_after_secs: Some(secs),
                ..
            } => format!(
                "The repository is throttling requests.\n   It asked to retry after {} seconds.",
                secs
            ),
            AppError::ServiceBusy { .. } => {
                "The repository is throttling requests. Please wait and try again.".to_string()
            }
            AppError::PageUnavailable { set, .. } => format!(
                "Could not fetch set '{}' after several attempts.\n   Run the sync again later to fill the gap.",
                set
            ),
            AppError::SyncAlreadyRunning => {
                "A sync is already in progress. Wait for it to finish.".to_string()
            }
            AppError::Cancelled => "Sync cancelled. Progress was checkpointed.".to_string(),
            AppError::CheckpointError(msg) => {
                format!(
                    "Checkpoint problem: {}\n   Try `pubtrend checkpoint clear`.",
                    msg
                )
            }
            AppError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n   Check your configuration file.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is a transient transport failure worth
    /// another attempt.
    ///
    /// Malformed bodies count as transient: a truncated response from an
    /// overloaded server parses as garbage but usually succeeds on retry.
    ///
    /// # Examples
    ///
    /// ```
    /// use pubtrend_core::error::AppError;
    /// use pubtrend_core::models::OaiErrorCode;
    ///
    /// let err = AppError::NetworkError("connection reset".to_string());
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::Protocol {
    ///     code: OaiErrorCode::BadResumptionToken,
    ///     message: "expired".to_string(),
    /// };
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_)
                | AppError::Timeout(_)
                | AppError::ServiceBusy { .. }
                | AppError::ClientError(_)
                | AppError::MalformedResponse(_)
        )
    }

    /// Minimum delay the server asked for, if any.
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            AppError::ServiceBusy {
                retry_after_secs: Some(secs),
                ..
            } => Some(std::time::Duration::from_secs(*secs)),
            _ => None,
        }
    }
}
