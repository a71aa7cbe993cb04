//! OAI-PMH client for harvesting header listings from an arXiv-style
//! repository.
//!
//! The client does one HTTP round trip per call. Retries, backoff and rate
//! limiting live in `pubtrend_core::PageFetcher` and
//! `pubtrend_core::walk_listing`; this layer only classifies what went wrong
//! so that the retry loop can decide.

use std::time::Duration;

use pubtrend_core::HttpConfig;
use pubtrend_core::error::AppError;
use pubtrend_core::models::{ListRequest, PageResult};
use pubtrend_core::traits::OaiTransport;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use crate::xml::parse_list_response;

/// HTTP client for an OAI-PMH endpoint.
///
/// # Examples
///
/// ```no_run
/// use pubtrend_client::OaiPmhClient;
/// use pubtrend_core::ListRequest;
/// use pubtrend_core::traits::OaiTransport;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OaiPmhClient::new("https://export.arxiv.org/oai2")?;
/// let page = client
///     .fetch_page(&ListRequest::list_identifiers("oai_dc", Some("cs")))
///     .await?;
/// println!("{} headers on the first page", page.records.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct OaiPmhClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl OaiPmhClient {
    /// Creates a client for `base_url` with default HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the URL is malformed or not HTTP(S).
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        Self::with_config(base_url, &HttpConfig::default())
    }

    /// Creates a client with explicit timeouts and user agent.
    pub fn with_config(base_url: &str, config: &HttpConfig) -> Result<Self, AppError> {
        let base_url =
            Url::parse(base_url).map_err(|_| AppError::InvalidUrl(base_url.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(AppError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Full URL for `request`.
    pub fn request_url(&self, request: &ListRequest) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().extend_pairs(request.query_pairs());
        url
    }

    async fn get_body(&self, url: Url) -> Result<String, AppError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let status = resp.status();
        if let Some(err) = classify_status(status, resp.headers(), &url) {
            return Err(err);
        }

        resp.text()
            .await
            .map_err(|e| self.classify_transport_error(e))
    }

    fn classify_transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout.as_secs())
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {}", e))
        } else if e.is_body() || e.is_decode() {
            AppError::NetworkError(format!("Failed to read response body: {}", e))
        } else {
            AppError::ClientError(e.to_string())
        }
    }
}

impl OaiTransport for OaiPmhClient {
    async fn fetch_page(&self, request: &ListRequest) -> Result<PageResult, AppError> {
        let url = self.request_url(request);
        debug!(set = request.set_label(), url = %url, "Requesting page");

        let body = self.get_body(url).await?;
        let page = parse_list_response(&body)?;

        debug!(
            set = request.set_label(),
            records = page.records.len(),
            has_more = page.resumption_token.is_some(),
            "Parsed page"
        );
        Ok(page)
    }
}

/// Maps a non-success status to the matching error, `None` for 2xx.
///
/// 429 and 503 are the repository asking for a pause and carry its
/// `Retry-After`; every other status is a plain client error.
pub(crate) fn classify_status(
    status: StatusCode,
    headers: &HeaderMap,
    url: &Url,
) -> Option<AppError> {
    if status.is_success() {
        return None;
    }

    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
        return Some(AppError::ServiceBusy {
            status: status.as_u16(),
            retry_after_secs: retry_after_secs(headers),
        });
    }

    Some(AppError::ClientError(format!(
        "HTTP {} from {}",
        status.as_u16(),
        url
    )))
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
pub(crate) fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
