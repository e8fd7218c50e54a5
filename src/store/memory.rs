//! Bounded in-memory store.

use std::time::SystemTime;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream;
use moka::future::Cache;

use super::{ByteSink, ByteStream, Store};
use crate::error::{StoreError, StoreResult};
use crate::types::StatResult;

/// Default maximum number of entries held by a [`MemoryStore`].
const DEFAULT_MAX_ENTRIES: u64 = 10_000;

#[derive(Clone, Debug)]
struct Entry {
    data: Bytes,
    mod_time: SystemTime,
}

/// Thread-safe in-memory store.
///
/// Uses a bounded LRU cache (moka) so a long-running process cannot grow
/// without limit. An evicted entry is simply reported as not found, which
/// the orchestrator treats as a cache miss and regenerates.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Cache<String, Entry>,
    name: String,
}

impl MemoryStore {
    /// Create an empty store with the default max capacity (10,000).
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Create a store with a custom max capacity.
    pub fn with_max_entries(max: u64) -> Self {
        Self {
            entries: Cache::new(max),
            name: "memory".to_string(),
        }
    }

    /// Rename the store (used in logs and metric labels).
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Insert (or overwrite) an entry with an explicit modification time.
    pub async fn insert(
        &self,
        key: impl Into<String>,
        data: impl Into<Bytes>,
        mod_time: SystemTime,
    ) {
        self.entries
            .insert(
                key.into(),
                Entry {
                    data: data.into(),
                    mod_time,
                },
            )
            .await;
    }

    /// Current bytes stored for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.entries.get(key).await.map(|e| e.data)
    }

    /// Remove `key`.
    pub async fn remove(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    /// Number of entries currently in the store.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stat(&self, key: &str) -> StoreResult<StatResult> {
        self.entries
            .get(key)
            .await
            .map(|e| StatResult::new(e.mod_time))
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn open_read(&self, key: &str) -> StoreResult<ByteStream> {
        let entry = self
            .entries
            .get(key)
            .await
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(Box::pin(stream::iter([Ok(entry.data)])))
    }

    async fn open_write(&self, key: &str) -> StoreResult<Box<dyn ByteSink>> {
        Ok(Box::new(MemorySink {
            entries: self.entries.clone(),
            key: key.to_string(),
            buf: BytesMut::new(),
        }))
    }

    async fn touch(
        &self,
        key: &str,
        _accessed: SystemTime,
        modified: SystemTime,
    ) -> StoreResult<()> {
        let entry = self
            .entries
            .get(key)
            .await
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        self.entries
            .insert(
                key.to_string(),
                Entry {
                    data: entry.data,
                    mod_time: modified,
                },
            )
            .await;
        Ok(())
    }
}

/// Write handle for [`MemoryStore`]; the entry appears on close.
struct MemorySink {
    entries: Cache<String, Entry>,
    key: String,
    buf: BytesMut,
}

#[async_trait]
impl ByteSink for MemorySink {
    async fn write(&mut self, chunk: Bytes) -> StoreResult<()> {
        self.buf.extend_from_slice(&chunk);
        Ok(())
    }

    async fn close(&mut self) -> StoreResult<()> {
        let data = std::mem::take(&mut self.buf).freeze();
        self.entries
            .insert(
                self.key.clone(),
                Entry {
                    data,
                    mod_time: SystemTime::now(),
                },
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::time::{Duration, UNIX_EPOCH};

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = MemoryStore::new();
        assert!(store.stat("nope").await.unwrap_err().is_not_found());
        assert!(store.open_read("nope").await.err().unwrap().is_not_found());
    }

    #[tokio::test]
    async fn write_is_visible_after_close() {
        let store = MemoryStore::new();
        let mut sink = store.open_write("k").await.unwrap();
        sink.write(Bytes::from_static(b"ab")).await.unwrap();
        sink.write(Bytes::from_static(b"cd")).await.unwrap();
        assert!(store.get("k").await.is_none());

        sink.close().await.unwrap();
        let chunks: Vec<_> = store
            .open_read("k")
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec![Bytes::from_static(b"abcd")]);
    }

    #[tokio::test]
    async fn touch_rewrites_mod_time() {
        let store = MemoryStore::new();
        store.insert("k", "v", SystemTime::now()).await;

        let then = UNIX_EPOCH + Duration::from_secs(305_942_400);
        store.touch("k", then, then).await.unwrap();
        assert_eq!(store.stat("k").await.unwrap().mod_time, then);
        assert_eq!(store.get("k").await.unwrap(), Bytes::from_static(b"v"));
    }

    #[tokio::test]
    async fn touch_missing_key_fails() {
        let store = MemoryStore::new();
        let now = SystemTime::now();
        assert!(store.touch("k", now, now).await.unwrap_err().is_not_found());
    }
}
