//! API client for the remote profile directory.
//!
//! This module provides the `ApiClient` struct, the HTTP implementation of
//! `PageFetcher`, `StatusSync` and `AssetSource`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Request};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{Decision, DirectoryResponse, ProfileId, RemoteRecord};

use super::{AssetSource, FetchError, PageFetcher, StatusSync};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct StatusBody {
    status: Decision,
}

/// API client for the profile directory.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    seed: Option<String>,
    status_url: Option<String>,
}

impl ApiClient {
    /// Create a new API client for the directory at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            seed: None,
            status_url: None,
        })
    }

    /// Create a client from the loaded configuration
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let mut api = Self::new(config.api_base_url.clone())?;
        api.seed = Some(config.seed.clone()).filter(|s| !s.is_empty());
        api.status_url = config.status_url.clone();
        Ok(api)
    }

    /// Pin the directory's random generator so pages stay stable across calls
    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    /// Endpoint that receives decisions as `POST {status_url}/{id}`
    pub fn with_status_url(mut self, status_url: impl Into<String>) -> Self {
        self.status_url = Some(status_url.into().trim_end_matches('/').to_string());
        self
    }

    fn page_request(&self, page: u32, page_size: u32) -> Result<Request, FetchError> {
        let mut query = vec![
            ("page", page.to_string()),
            ("results", page_size.to_string()),
        ];
        if let Some(ref seed) = self.seed {
            query.push(("seed", seed.clone()));
        }

        let request = self
            .client
            .get(format!("{}/", self.base_url))
            .header(header::ACCEPT, "application/json")
            .query(&query)
            .build()?;
        Ok(request)
    }

    fn status_request(
        &self,
        status_url: &str,
        id: ProfileId,
        decision: Decision,
    ) -> Result<Request, FetchError> {
        let request = self
            .client
            .post(format!("{}/{}", status_url.trim_end_matches('/'), id))
            .json(&StatusBody { status: decision })
            .build()?;
        Ok(request)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, FetchError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            // Rate limited - signal to retry
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::from_status(status, &body))
        }
    }

    /// Execute a request, retrying with exponential backoff while rate limited.
    async fn execute(
        &self,
        build: impl Fn() -> Result<Request, FetchError>,
    ) -> Result<reqwest::Response, FetchError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let request = build()?;
            let url = request.url().to_string();
            let response = self.client.execute(request).await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(FetchError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    // ===== Data Fetching Methods =====

    /// Fetch one page of profiles from the directory
    pub async fn fetch_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<RemoteRecord>, FetchError> {
        let response = self.execute(|| self.page_request(page, page_size)).await?;
        let text = response.text().await?;
        let parsed: DirectoryResponse = serde_json::from_str(&text)?;

        let total = parsed.results.len();
        let records: Vec<RemoteRecord> = parsed
            .results
            .iter()
            .filter_map(|user| {
                let record = user.to_remote_record();
                if record.is_none() {
                    warn!(uuid = %user.login.uuid, "Skipping profile with invalid identity");
                }
                record
            })
            .collect();

        debug!(page, fetched = total, kept = records.len(), "Directory page fetched");
        Ok(records)
    }
}

#[async_trait]
impl PageFetcher for ApiClient {
    async fn fetch(&self, page: u32, page_size: u32) -> Result<Vec<RemoteRecord>, FetchError> {
        self.fetch_page(page, page_size).await
    }
}

#[async_trait]
impl StatusSync for ApiClient {
    async fn notify(&self, id: ProfileId, decision: Decision) -> Result<(), FetchError> {
        let Some(ref status_url) = self.status_url else {
            // The directory has no status endpoint
            info!(%id, %decision, "Syncing status");
            return Ok(());
        };

        self.execute(|| self.status_request(status_url, id, decision))
            .await?;
        debug!(%id, %decision, "Status delivered");
        Ok(())
    }
}

#[async_trait]
impl AssetSource for ApiClient {
    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .execute(|| Ok(self.client.get(url).build()?))
            .await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
