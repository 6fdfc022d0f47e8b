//! Directory Client
//!
//! Read-only client for the directory API that maps `owner/name` keys to
//! content identifiers. Every fetch is fresh; no caching happens at this
//! layer. Non-success responses surface their raw body as the error detail
//! so callers can show the server's own message.

use crate::error::DirectoryError;
use crate::record::Record;
use crate::types::Cid;
use reqwest::{Response, StatusCode, Url};
use std::time::Duration;
use tracing::debug;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for one directory server.
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl DirectoryClient {
    /// Create a client for `base_url`, e.g. `https://directory.example.com`.
    pub fn new(base_url: &str) -> Result<Self, DirectoryError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| DirectoryError::Unavailable(format!("invalid directory url: {}", e)))?;
        if parsed.cannot_be_a_base() {
            return Err(DirectoryError::Unavailable(format!(
                "invalid directory url: {}",
                base_url
            )));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List all records, or only one owner's when `scope_owner` is given.
    pub async fn list_entries(
        &self,
        scope_owner: Option<&str>,
    ) -> Result<Vec<Record>, DirectoryError> {
        let url = match scope_owner {
            Some(owner) => format!("{}/{}", self.base_url, owner),
            None => format!("{}/", self.base_url),
        };
        debug!(%url, "listing directory entries");
        let resp = self.request(&url, &[]).await?;
        decode_list(resp).await
    }

    /// Reverse lookup: all records whose current version is `cid`.
    pub async fn find_by_cid(&self, cid: &Cid) -> Result<Vec<Record>, DirectoryError> {
        let url = format!("{}/", self.base_url);
        debug!(%url, cid = %cid, "looking up records by cid");
        let resp = self.request(&url, &[("cid", cid.as_str())]).await?;
        decode_list(resp).await
    }

    /// Fetch one record. With `full`, the response additionally carries
    /// `body` and `history`.
    pub async fn get_entry(
        &self,
        owner: &str,
        name: &str,
        full: bool,
    ) -> Result<Record, DirectoryError> {
        let url = format!("{}/{}/{}", self.base_url, owner, name);
        debug!(%url, full, "fetching directory entry");
        let query: &[(&str, &str)] = if full { &[("full", "1")] } else { &[] };

        let resp = self
            .http
            .get(&url)
            .query(query)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(DirectoryError::NotFound {
                owner: owner.to_string(),
                name: name.to_string(),
            });
        }
        let resp = non_success_to_error(resp).await?;

        // The directory encodes a missing single entry as a JSON `null`
        // with status 200.
        let entry: Option<Record> = resp
            .json()
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("invalid response: {}", e)))?;
        entry.ok_or_else(|| DirectoryError::NotFound {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    async fn request(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, DirectoryError> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        non_success_to_error(resp).await
    }
}

async fn non_success_to_error(resp: Response) -> Result<Response, DirectoryError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(DirectoryError::Unavailable(body))
}

async fn decode_list(resp: Response) -> Result<Vec<Record>, DirectoryError> {
    let entries: Option<Vec<Record>> = resp
        .json()
        .await
        .map_err(|e| DirectoryError::Unavailable(format!("invalid response: {}", e)))?;
    Ok(entries.unwrap_or_default())
}
