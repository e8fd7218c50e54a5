//! Read-only store over static HTTP hosting.
//!
//! Serves reads from any server that answers `HEAD`/`GET` for
//! `{base_url}/{key}` and reports `Last-Modified` (e.g. an S3 static
//! website endpoint or a CDN in front of the origin). Writes are refused.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::LAST_MODIFIED;
use reqwest::{Client, Response, StatusCode};

use super::{ByteSink, ByteStream, Store};
use crate::error::{StoreError, StoreResult};
use crate::types::StatResult;
use crate::{CachineError, Result};

/// Default connect and read timeout for [`HttpStore`].
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Store that reads resources over HTTP.
#[derive(Clone)]
pub struct HttpStore {
    http: Client,
    base_url: String,
    name: String,
}

impl HttpStore {
    /// Create a store for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a store with a custom timeout.
    ///
    /// `timeout` bounds connecting and each individual read, not the whole
    /// response, so large bodies can stream for as long as data keeps coming.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(crate::version::user_agent())
            .build()
            .map_err(|e| CachineError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a store sharing an existing HTTP client.
    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let name = format!("http:{base_url}");
        Self {
            http,
            base_url,
            name,
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }

    /// Map non-success statuses to store errors.
    fn check_status(response: &Response, key: &str) -> StoreResult<()> {
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(StoreError::NotFound(key.to_string())),
            status => Err(StoreError::Http(format!("{status} for {key}"))),
        }
    }
}

/// Obsolete HTTP date forms: RFC 850 and C `asctime()`.
const OBSOLETE_DATE_FORMATS: [&str; 2] = ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

/// Parse an HTTP date (`Wed, 21 Oct 2015 07:28:00 GMT`), accepting the
/// obsolete forms recipients must still understand.
fn parse_http_date(value: &str) -> Option<SystemTime> {
    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        return Some(SystemTime::from(date));
    }
    OBSOLETE_DATE_FORMATS.iter().find_map(|format| {
        chrono::NaiveDateTime::parse_from_str(value.trim(), format)
            .ok()
            .map(|naive| SystemTime::from(naive.and_utc()))
    })
}

#[async_trait]
impl Store for HttpStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stat(&self, key: &str) -> StoreResult<StatResult> {
        let response = self
            .http
            .head(self.url_for(key))
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;
        Self::check_status(&response, key)?;

        let header = response
            .headers()
            .get(LAST_MODIFIED)
            .ok_or_else(|| StoreError::Http(format!("no Last-Modified header for {key}")))?;
        let mod_time = header
            .to_str()
            .ok()
            .and_then(parse_http_date)
            .ok_or_else(|| StoreError::Http(format!("unparseable Last-Modified for {key}")))?;
        Ok(StatResult::new(mod_time))
    }

    async fn open_read(&self, key: &str) -> StoreResult<ByteStream> {
        let response = self
            .http
            .get(self.url_for(key))
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;
        Self::check_status(&response, key)?;

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| StoreError::Http(e.to_string()))),
        ))
    }

    async fn open_write(&self, _key: &str) -> StoreResult<Box<dyn ByteSink>> {
        Err(StoreError::ReadOnly)
    }
}
