//! Feed transport capability.
//!
//! Updaters never talk HTTP directly: they receive a [`FeedFetcher`] so that
//! tests can swap in a canned transport and so that cheap change checks
//! (`HEAD`) stay separate from full body downloads.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::debug;

use crate::application::errors::FetchError;

/// Change-detection headers of an upstream resource.
#[derive(Debug, Clone, Default)]
pub struct FetchMetadata {
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// A fully fetched feed body plus the metadata that came with it.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

/// Transport capability used by every updater.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Downloads the resource at `url` in full.
    async fn get(&self, url: &str) -> Result<FetchedBody, FetchError>;

    /// Fetches only the change-detection metadata of `url`, without the body.
    async fn head(&self, url: &str) -> Result<FetchMetadata, FetchError>;
}

/// `reqwest`-backed fetcher. Timeouts and cancellation are transport
/// concerns and live here, on the client, not inside the updaters.
pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vulnfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        Self { client }
    }

    fn metadata_from(response: &reqwest::Response) -> FetchMetadata {
        let last_modified = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
            .map(|value| value.with_timezone(&Utc));

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        FetchMetadata {
            last_modified,
            etag,
        }
    }

    fn check_status(response: &reqwest::Response, url: &str) -> Result<(), FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for HttpFeedFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn get(&self, url: &str) -> Result<FetchedBody, FetchError> {
        debug!(url, "fetching feed body");
        let response = self.client.get(url).send().await?;
        Self::check_status(&response, url)?;

        let metadata = Self::metadata_from(&response);
        let bytes = response.bytes().await?.to_vec();

        Ok(FetchedBody { bytes, metadata })
    }

    async fn head(&self, url: &str) -> Result<FetchMetadata, FetchError> {
        debug!(url, "checking feed metadata");
        let response = self.client.head(url).send().await?;
        Self::check_status(&response, url)?;

        Ok(Self::metadata_from(&response))
    }
}
