//! Object storage store (S3 and compatible services).

use std::error::Error;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::{ByteStream as S3Body, DateTime};
use bytes::{Bytes, BytesMut};
use futures_util::stream;
use tracing::debug;

use super::{ByteSink, ByteStream, Store};
use crate::error::{StoreError, StoreResult};
use crate::types::StatResult;

/// Connection settings for [`S3Store`].
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket name.
    pub bucket: String,
    /// AWS region.
    pub region: String,
    /// S3-compatible endpoint URL (MinIO, LocalStack, ...).
    pub endpoint: Option<String>,
    /// Optional key prefix within the bucket.
    pub prefix: Option<String>,
}

/// Store backed by an S3 bucket.
///
/// Writes are buffered in memory and uploaded with a single `PutObject` on
/// close. S3 cannot set an object's modification time, so `touch` is a
/// no-op and a regenerated entry carries its upload time instead.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    name: String,
}

impl S3Store {
    /// Load AWS configuration from the environment and connect.
    pub async fn connect(config: S3Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // Custom endpoints only understand path-style addressing.
        let client = if config.endpoint.is_some() {
            let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                .force_path_style(true)
                .build();
            Client::from_conf(s3_config)
        } else {
            Client::new(&sdk_config)
        };
        Self::with_client(client, config.bucket, config.prefix)
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client, bucket: impl Into<String>, prefix: Option<String>) -> Self {
        let bucket = bucket.into();
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        let name = match &prefix {
            Some(p) => format!("s3:{bucket}/{p}"),
            None => format!("s3:{bucket}"),
        };
        Self {
            client,
            bucket,
            prefix,
            name,
        }
    }

    fn object_key(&self, key: &str) -> String {
        object_key(self.prefix.as_deref(), key)
    }
}

fn object_key(prefix: Option<&str>, key: &str) -> String {
    let key = key.trim_start_matches('/');
    match prefix {
        Some(p) => format!("{p}/{key}"),
        None => key.to_string(),
    }
}

fn to_system_time(dt: &DateTime) -> SystemTime {
    let secs = dt.secs();
    let nanos = dt.subsec_nanos();
    if secs >= 0 {
        UNIX_EPOCH + Duration::new(secs.unsigned_abs(), nanos)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
            + Duration::from_nanos(u64::from(nanos))
    }
}

/// Flatten an SDK error and its sources into one line.
fn error_chain(err: &dyn Error) -> String {
    let mut msgs = vec![err.to_string()];
    let mut source = err.source();
    while let Some(s) = source {
        msgs.push(s.to_string());
        source = s.source();
    }
    msgs.join(": ")
}

#[async_trait]
impl Store for S3Store {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stat(&self, key: &str) -> StoreResult<StatResult> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(service) if service.is_not_found() => StoreError::NotFound(key.to_string()),
                _ => StoreError::Http(error_chain(&e)),
            })?;
        let mod_time = output
            .last_modified()
            .map(to_system_time)
            .ok_or_else(|| StoreError::Http(format!("no LastModified for {key}")))?;
        Ok(StatResult::new(mod_time))
    }

    async fn open_read(&self, key: &str) -> StoreResult<ByteStream> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(service) if service.is_no_such_key() => StoreError::NotFound(key.to_string()),
                _ => StoreError::Http(error_chain(&e)),
            })?;

        let body = stream::unfold(output.body, |mut body| async move {
            body.try_next()
                .await
                .map_err(|e| StoreError::Http(error_chain(&e)))
                .transpose()
                .map(|chunk| (chunk, body))
        });
        Ok(Box::pin(body))
    }

    async fn open_write(&self, key: &str) -> StoreResult<Box<dyn ByteSink>> {
        Ok(Box::new(S3Sink {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            object_key: self.object_key(key),
            buf: BytesMut::new(),
        }))
    }
}

/// Write handle for [`S3Store`]; uploads on close.
struct S3Sink {
    client: Client,
    bucket: String,
    object_key: String,
    buf: BytesMut,
}

#[async_trait]
impl ByteSink for S3Sink {
    async fn write(&mut self, chunk: Bytes) -> StoreResult<()> {
        self.buf.extend_from_slice(&chunk);
        Ok(())
    }

    async fn close(&mut self) -> StoreResult<()> {
        let body = std::mem::take(&mut self.buf).freeze();
        let len = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.object_key)
            .body(S3Body::from(body))
            .send()
            .await
            .map_err(|e| StoreError::Http(error_chain(&e)))?;
        debug!(bucket = %self.bucket, key = %self.object_key, len, "uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_join_prefix() {
        assert_eq!(object_key(None, "/12x34/a.jpg"), "12x34/a.jpg");
        assert_eq!(object_key(Some("derived"), "/12x34/a.jpg"), "derived/12x34/a.jpg");
    }

    #[test]
    fn converts_timestamps() {
        let dt = DateTime::from_secs(1_445_412_480);
        assert_eq!(
            to_system_time(&dt),
            UNIX_EPOCH + Duration::from_secs(1_445_412_480)
        );
        let before = DateTime::from_secs(-10);
        assert_eq!(to_system_time(&before), UNIX_EPOCH - Duration::from_secs(10));
    }
}
