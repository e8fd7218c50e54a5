//! Write-through tee: one pass over the transform output feeds both the
//! cache store and the consumer.

use std::time::SystemTime;

use futures_util::StreamExt;
use tracing::{debug, warn};

use super::session::{Abort, EventSender, emit};
use crate::processor::Transform;
use crate::store::{RoleSink, RoleStore};
use crate::telemetry;
use crate::types::{CacheKey, ChunkStream, RequestEvent, ResourceKey};

/// Copies every chunk into a cache sink, optionally forwarding it as
/// [`RequestEvent::Data`].
struct Tee<'a> {
    sink: RoleSink,
    forward: Option<&'a EventSender>,
}

impl<'a> Tee<'a> {
    fn new(sink: RoleSink, forward: Option<&'a EventSender>) -> Self {
        Self { sink, forward }
    }

    /// Drain `output`, then commit the sink. Returns the number of bytes
    /// written.
    ///
    /// Any failure leaves whatever the sink has accepted so far; the entry
    /// keeps a stale modification time and is regenerated next time.
    async fn run(mut self, mut output: ChunkStream) -> Result<u64, Abort> {
        let mut written = 0u64;
        while let Some(chunk) = output.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;

            self.sink.write(chunk.clone()).await?;
            if let Some(tx) = self.forward {
                emit(tx, RequestEvent::Data(chunk)).await?;
            }
        }

        self.sink.close().await?;
        Ok(written)
    }
}

/// One regeneration of a cache entry, detached from its session.
pub(super) struct Regeneration {
    pub(super) origin: RoleStore,
    pub(super) cache: RoleStore,
    pub(super) key: ResourceKey,
    pub(super) cache_key: CacheKey,
    pub(super) origin_mod_time: SystemTime,
    pub(super) transform: Box<dyn Transform>,
}

impl Regeneration {
    /// Pipe the origin through the transform into the cache, forwarding
    /// chunks when `forward` is set, then stamp the entry.
    pub(super) async fn run(self, forward: Option<&EventSender>) -> Result<u64, Abort> {
        let input = self.origin.open_read(self.key.as_str()).await?;
        let sink = self.cache.open_write(self.cache_key.as_str()).await?;
        let output = self.transform.apply(input);
        let bytes = Tee::new(sink, forward).run(output).await?;

        touch_cache_entry(&self.cache, &self.cache_key, self.origin_mod_time).await;
        Ok(bytes)
    }
}

/// Stamp the regenerated cache entry with the origin's modification time.
///
/// Best-effort: failures are logged and counted, never surfaced.
async fn touch_cache_entry(
    cache: &RoleStore,
    cache_key: &CacheKey,
    origin_mod_time: SystemTime,
) {
    match cache
        .touch(cache_key.as_str(), origin_mod_time, origin_mod_time)
        .await
    {
        Ok(()) => debug!(cache_key = %cache_key, "cache entry stamped"),
        Err(err) => {
            warn!(
                store = cache.name(),
                cache_key = %cache_key,
                error = %err,
                "failed to stamp cache entry"
            );
            metrics::counter!(telemetry::TOUCH_FAILURES_TOTAL,
                "store" => cache.name().to_owned(),
            )
            .increment(1);
        }
    }
}
