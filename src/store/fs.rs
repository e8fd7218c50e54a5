//! Filesystem store rooted at a directory.

use std::fs::FileTimes;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{ByteSink, ByteStream, ReaderChunks, Store};
use crate::error::{StoreError, StoreResult};
use crate::types::StatResult;

/// Distinguishes temporary files of concurrent writers within one process.
static NEXT_TEMP_ID: AtomicU64 = AtomicU64::new(0);

/// Store backed by a directory tree.
///
/// Keys are `/`-separated paths relative to the root; a leading `/` is
/// ignored and `..` components are rejected. Writes go to a temporary
/// sibling file which is renamed over the target on
/// [`close`](ByteSink::close), so concurrent readers see either the previous
/// entry or the complete new one.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    name: String,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = format!("fs:{}", root.display());
        Self { root, name }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto a path below the root.
    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let mut path = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(key).components() {
            match component {
                Component::Normal(segment) => {
                    path.push(segment);
                    depth += 1;
                }
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(StoreError::InvalidKey(key.to_string()));
                }
            }
        }
        if depth == 0 {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(path)
    }
}

#[async_trait]
impl Store for FsStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stat(&self, key: &str) -> StoreResult<StatResult> {
        let path = self.path_for(key)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| StoreError::io(key, e))?;
        if !metadata.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        let mod_time = metadata.modified().map_err(|e| StoreError::io(key, e))?;
        Ok(StatResult::new(mod_time))
    }

    async fn open_read(&self, key: &str) -> StoreResult<ByteStream> {
        let path = self.path_for(key)?;
        let file = File::open(&path).await.map_err(|e| StoreError::io(key, e))?;
        Ok(Box::pin(ReaderChunks::new(file, key)))
    }

    async fn open_write(&self, key: &str) -> StoreResult<Box<dyn ByteSink>> {
        let target = self.path_for(key)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(key, e))?;
        }

        let temp = temp_path_for(&target);
        let file = File::create(&temp)
            .await
            .map_err(|e| StoreError::io(key, e))?;
        debug!(store = %self.name, key, temp = %temp.display(), "opened cache write");

        Ok(Box::new(FsSink {
            key: key.to_string(),
            file: Some(file),
            temp,
            target,
        }))
    }

    async fn touch(
        &self,
        key: &str,
        accessed: SystemTime,
        modified: SystemTime,
    ) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let owned_key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::OpenOptions::new().write(true).open(&path)?;
            file.set_times(FileTimes::new().set_accessed(accessed).set_modified(modified))
        })
        .await
        .map_err(|e| StoreError::Io {
            key: owned_key.clone(),
            source: std::io::Error::other(e),
        })?
        .map_err(|e| StoreError::io(owned_key, e))
    }
}

fn temp_path_for(target: &Path) -> PathBuf {
    let id = NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed);
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{file_name}.{}-{id}.tmp", std::process::id()))
}

/// Write handle for [`FsStore`].
struct FsSink {
    key: String,
    file: Option<File>,
    temp: PathBuf,
    target: PathBuf,
}

#[async_trait]
impl ByteSink for FsSink {
    async fn write(&mut self, chunk: Bytes) -> StoreResult<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StoreError::io(&self.key, closed_error()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| StoreError::io(&self.key, e))
    }

    async fn close(&mut self) -> StoreResult<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StoreError::io(&self.key, closed_error()))?;
        // tokio completes file writes in the background; flush before rename
        // so the final modification time is not bumped after a later touch.
        // A failed flush keeps the handle, so Drop still discards the temp file.
        file.flush().await.map_err(|e| StoreError::io(&self.key, e))?;
        self.file = None;
        if let Err(e) = fs::rename(&self.temp, &self.target).await {
            let _ = fs::remove_file(&self.temp).await;
            return Err(StoreError::io(&self.key, e));
        }
        Ok(())
    }
}

impl Drop for FsSink {
    fn drop(&mut self) {
        if self.file.is_some() {
            // Abandoned before close: the target is untouched, discard the partial copy.
            let _ = std::fs::remove_file(&self.temp);
        }
    }
}

fn closed_error() -> std::io::Error {
    std::io::Error::other("write handle already closed")
}
