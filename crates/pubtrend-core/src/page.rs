//! Retrying page fetch on top of a single-attempt [`OaiTransport`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::AppError;
use crate::config::RetryPolicy;
use crate::models::{ListRequest, OaiErrorCode, PageResult};
use crate::traits::OaiTransport;

/// Sleeps for `duration` unless `cancel` fires first.
pub(crate) async fn sleep_or_cancel(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    if duration.is_zero() {
        return if cancel.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Fetches single pages, retrying transient failures with exponential
/// backoff.
///
/// - Transient errors are retried up to `max_retries` times, waiting
///   `base × 2^attempt` (or the server's `Retry-After`, whichever is longer).
/// - `noRecordsMatch` is an empty page, not a failure.
/// - Other protocol errors are returned immediately.
/// - Exhausting the budget yields [`AppError::PageUnavailable`], never an
///   empty page.
#[derive(Debug, Clone)]
pub struct PageFetcher<T: OaiTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: OaiTransport> PageFetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches one page.
    ///
    /// # Errors
    ///
    /// - [`AppError::Cancelled`] if `cancel` fires during the request or a
    ///   backoff sleep
    /// - [`AppError::Protocol`] for semantic repository errors
    /// - [`AppError::PageUnavailable`] once retries are exhausted
    pub async fn fetch(
        &self,
        request: &ListRequest,
        cancel: &CancellationToken,
    ) -> Result<PageResult, AppError> {
        let mut attempt: u32 = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                result = self.transport.fetch_page(request) => result,
            };

            let err = match result {
                Ok(page) => return Ok(page),
                Err(AppError::Protocol {
                    code: OaiErrorCode::NoRecordsMatch,
                    ..
                }) => return Ok(PageResult::empty()),
                Err(err) => err,
            };

            if !err.is_retryable() {
                if let AppError::Protocol { code, message } = &err {
                    error!(
                        set = request.set_label(),
                        code = %code,
                        message = %message,
                        "Repository returned an error"
                    );
                }
                return Err(err);
            }

            if attempt >= self.policy.max_retries {
                return Err(AppError::PageUnavailable {
                    set: request.set_label().to_string(),
                    attempts: attempt + 1,
                    last_error: err.to_string(),
                });
            }

            let backoff = self.policy.delay_for_attempt(attempt);
            let delay = err.retry_after().map_or(backoff, |after| after.max(backoff));
            warn!(
                set = request.set_label(),
                attempt = attempt + 1,
                max_retries = self.policy.max_retries,
                delay_secs = delay.as_secs(),
                error = %err,
                "Page request failed, retrying"
            );

            sleep_or_cancel(delay, cancel).await?;
            attempt += 1;
        }
    }
}
