//! Remote collaborator for the mock quote feed.
//!
//! The feed speaks a JSONPlaceholder-style `/posts` resource: `title`
//! carries the category and `body` carries the quote text on the wire.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Quote, QuoteId};

/// Default endpoint of the mock feed.
pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

/// Default number of records fetched per pull.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// User id stamped on created records; the feed requires one.
const REMOTE_USER_ID: i64 = 1;

/// Errors from the remote collaborator.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {0}")]
    Api(String),
}

/// A record as served by the remote feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: i64,
    pub title: String,
    pub body: String,
}

impl RemoteRecord {
    /// Map into the local quote shape, preserving the remote identity.
    #[must_use]
    pub fn into_quote(self) -> Quote {
        Quote {
            id: QuoteId::remote(self.id),
            text: self.body,
            category: self.title,
            remote_id: Some(self.id),
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Payload of a create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPayload {
    pub title: String,
    pub body: String,
    pub user_id: i64,
}

impl RecordPayload {
    /// Build the push payload for a local quote.
    #[must_use]
    pub fn for_quote(quote: &Quote) -> Self {
        Self {
            title: quote.category.clone(),
            body: quote.text.clone(),
            user_id: REMOTE_USER_ID,
        }
    }
}

/// Remote feed configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Feed base URL, e.g. `https://jsonplaceholder.typicode.com`
    pub base_url: String,
    /// Records fetched per pull
    pub page_size: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl RemoteConfig {
    /// Configuration for the given endpoint with default paging.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the pull page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

/// The remote collaborator: list a bounded page, create one record.
#[allow(async_fn_in_trait)] // futures are driven on the caller's task
pub trait RemoteApi {
    /// Fetch up to `limit` records from the feed.
    async fn list_records(&self, limit: usize) -> Result<Vec<RemoteRecord>, RemoteError>;

    /// Create one record; the response carries the assigned remote id.
    async fn create_record(&self, payload: &RecordPayload) -> Result<RemoteRecord, RemoteError>;
}

impl<T: RemoteApi> RemoteApi for std::sync::Arc<T> {
    async fn list_records(&self, limit: usize) -> Result<Vec<RemoteRecord>, RemoteError> {
        (**self).list_records(limit).await
    }

    async fn create_record(&self, payload: &RecordPayload) -> Result<RemoteRecord, RemoteError> {
        (**self).create_record(payload).await
    }
}

/// HTTP implementation of [`RemoteApi`].
#[derive(Clone)]
pub struct HttpRemoteApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemoteApi {
    /// Build a client for the configured endpoint.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let base_url = normalize_endpoint(&config.base_url)?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().build()?,
        })
    }

    fn posts_url(&self) -> String {
        format!("{}/posts", self.base_url)
    }
}

impl RemoteApi for HttpRemoteApi {
    async fn list_records(&self, limit: usize) -> Result<Vec<RemoteRecord>, RemoteError> {
        let response = self
            .client
            .get(self.posts_url())
            .query(&[("_limit", limit.to_string())])
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        let mut records = response.json::<Vec<RemoteRecord>>().await?;
        // Some feeds ignore the _limit parameter
        records.truncate(limit);
        Ok(records)
    }

    async fn create_record(&self, payload: &RecordPayload) -> Result<RemoteRecord, RemoteError> {
        let response = self
            .client
            .post(self.posts_url())
            .json(payload)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        Ok(response.json::<RemoteRecord>().await?)
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        let compact: String = trimmed.chars().take(180).collect();
        format!("{compact} ({})", status.as_u16())
    }
}

fn normalize_endpoint(raw: &str) -> Result<String, RemoteError> {
    let endpoint = raw.trim();
    if endpoint.is_empty() {
        return Err(RemoteError::InvalidConfiguration(
            "endpoint must not be empty".to_string(),
        ));
    }
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}
