//! Follows resumption tokens through a complete listing.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::AppError;
use crate::models::{HeaderRecord, ListRequest};
use crate::page::{PageFetcher, sleep_or_cancel};
use crate::progress::{ProgressReporter, SyncEvent};
use crate::traits::OaiTransport;

/// Result of walking one listing.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Live (non-deleted) records, in server order.
    pub records: Vec<HeaderRecord>,
    /// Pages successfully fetched.
    pub pages: usize,
    /// Records dropped because the header was marked deleted.
    pub deleted: usize,
    /// `true` when the listing ended with no resumption token.
    pub complete: bool,
    /// Why the walk stopped early, when `complete` is false.
    pub failure: Option<AppError>,
}

/// Walks every page of the listing that starts with `first`.
///
/// Waits `rate_limit` before every request except the first. A page that
/// cannot be fetched ends the walk with `complete = false`; the records
/// already collected are kept so the caller can still count them.
///
/// # Errors
///
/// Only [`AppError::Cancelled`]. Every other failure is reported through
/// [`WalkOutcome::failure`].
pub async fn walk_listing<T, R>(
    fetcher: &PageFetcher<T>,
    first: ListRequest,
    rate_limit: Duration,
    reporter: &R,
    cancel: &CancellationToken,
) -> Result<WalkOutcome, AppError>
where
    T: OaiTransport,
    R: ProgressReporter,
{
    let mut outcome = WalkOutcome::default();
    let mut request = first;

    loop {
        if outcome.pages > 0 {
            sleep_or_cancel(rate_limit, cancel).await?;
        }

        let page = match fetcher.fetch(&request, cancel).await {
            Ok(page) => page,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(err) => {
                outcome.failure = Some(err);
                return Ok(outcome);
            }
        };

        outcome.pages += 1;
        reporter.report(SyncEvent::PageFetched {
            set: request.set_label(),
            page: outcome.pages,
            records: page.records.len(),
            has_more: page.resumption_token.is_some(),
        });

        for record in page.records {
            if record.deleted {
                outcome.deleted += 1;
            } else {
                outcome.records.push(record);
            }
        }

        match page.resumption_token {
            Some(token) => request = request.resume(&token),
            None => {
                outcome.complete = true;
                return Ok(outcome);
            }
        }
    }
}
