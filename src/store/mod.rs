//! Store capability traits and backends.
//!
//! A [`Store`] is anything that can report a modification time for a key,
//! stream its bytes, accept new bytes for it, and (optionally) have its
//! modification time set. Two instances are wired into every
//! [`Orchestrator`](crate::Orchestrator): the *origin* (source of truth) and
//! the *cache* (derived artifacts). The same backend type may play either
//! role.
//!
//! # Error tagging
//!
//! Backends return untagged [`StoreError`]s. The orchestrator wraps each
//! store in a [`RoleStore`] that converts failures into
//! [`CachineError::Store`] with the [`StoreRole`] filled in at the point of
//! failure, so "cache entry absent" is a structural match rather than a
//! guess about which store raised the error.
//!
//! # Backends
//!
//! - [`FsStore`]: rooted directory on the local filesystem
//! - [`MemoryStore`]: bounded in-memory store
//! - [`HttpStore`]: read-only static hosting over HTTP (feature `http`)
//! - [`S3Store`]: object storage (feature `s3`)

mod chunks;
mod fs;
#[cfg(feature = "http")]
mod http;
mod memory;
#[cfg(feature = "s3")]
mod s3;

pub(crate) use chunks::ReaderChunks;
pub use fs::FsStore;
#[cfg(feature = "http")]
pub use http::HttpStore;
pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::{S3Config, S3Store};

use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::error::{CachineError, Result, StoreError, StoreResult, StoreRole};
use crate::types::{ChunkStream, StatResult};

/// Byte stream produced by [`Store::open_read`].
pub type ByteStream = Pin<Box<dyn Stream<Item = StoreResult<Bytes>> + Send>>;

/// Destination for bytes written to a store.
///
/// Nothing written is guaranteed to be visible until [`close`](Self::close)
/// succeeds. Dropping a sink without closing it abandons the write.
#[async_trait]
pub trait ByteSink: Send {
    /// Append a chunk.
    async fn write(&mut self, chunk: Bytes) -> StoreResult<()>;

    /// Flush and commit everything written so far.
    async fn close(&mut self) -> StoreResult<()>;
}

/// Storage capability required of origin and cache stores.
///
/// Implementations must be safe for concurrent use: the orchestrator shares
/// one instance across all in-flight requests and never serialises access
/// to a key.
#[async_trait]
pub trait Store: Send + Sync {
    /// Store name for logging/metrics.
    fn name(&self) -> &str;

    /// Report the modification time of `key`.
    ///
    /// Fails with [`StoreError::NotFound`] when the key does not exist.
    async fn stat(&self, key: &str) -> StoreResult<StatResult>;

    /// Open `key` for streaming reads.
    async fn open_read(&self, key: &str) -> StoreResult<ByteStream>;

    /// Open `key` for writing, creating any intermediate addressing
    /// structure. Never fails because the key already exists.
    async fn open_write(&self, key: &str) -> StoreResult<Box<dyn ByteSink>>;

    /// Set the access and modification times of `key`.
    ///
    /// Best-effort. Backends that cannot set arbitrary modification times
    /// keep this default no-op.
    async fn touch(
        &self,
        _key: &str,
        _accessed: SystemTime,
        _modified: SystemTime,
    ) -> StoreResult<()> {
        Ok(())
    }
}

/// A store bound to the role it plays in a request.
///
/// Every failure leaving this wrapper carries its [`StoreRole`].
#[derive(Clone)]
pub struct RoleStore {
    role: StoreRole,
    inner: Arc<dyn Store>,
}

impl RoleStore {
    pub fn new(role: StoreRole, inner: Arc<dyn Store>) -> Self {
        Self { role, inner }
    }

    pub fn role(&self) -> StoreRole {
        self.role
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    fn tag(&self, err: StoreError) -> CachineError {
        CachineError::store(self.role, err)
    }

    pub async fn stat(&self, key: &str) -> Result<StatResult> {
        self.inner.stat(key).await.map_err(|e| self.tag(e))
    }

    /// Open a read stream whose item errors are tagged with this role.
    pub async fn open_read(&self, key: &str) -> Result<ChunkStream> {
        let role = self.role;
        let stream = self.inner.open_read(key).await.map_err(|e| self.tag(e))?;
        Ok(Box::pin(
            stream.map(move |chunk| chunk.map_err(|e| CachineError::store(role, e))),
        ))
    }

    pub async fn open_write(&self, key: &str) -> Result<RoleSink> {
        let sink = self.inner.open_write(key).await.map_err(|e| self.tag(e))?;
        Ok(RoleSink {
            role: self.role,
            inner: sink,
        })
    }

    pub async fn touch(
        &self,
        key: &str,
        accessed: SystemTime,
        modified: SystemTime,
    ) -> Result<()> {
        self.inner
            .touch(key, accessed, modified)
            .await
            .map_err(|e| self.tag(e))
    }
}

/// A [`ByteSink`] whose failures are tagged with a [`StoreRole`].
pub struct RoleSink {
    role: StoreRole,
    inner: Box<dyn ByteSink>,
}

impl RoleSink {
    pub async fn write(&mut self, chunk: Bytes) -> Result<()> {
        let role = self.role;
        self.inner
            .write(chunk)
            .await
            .map_err(|e| CachineError::store(role, e))
    }

    pub async fn close(&mut self) -> Result<()> {
        let role = self.role;
        self.inner
            .close()
            .await
            .map_err(|e| CachineError::store(role, e))
    }
}
