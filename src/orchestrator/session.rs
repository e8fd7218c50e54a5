//! Per-request state machine.

use std::fmt;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::Shared;
use super::tee::Regeneration;
use crate::CachineError;
use crate::telemetry;
use crate::types::time::not_after;
use crate::types::{CacheKey, Meta, Predicates, RequestEvent, ResourceKey};

pub(super) type EventSender = mpsc::Sender<crate::Result<RequestEvent>>;

/// Why a session stopped before `End`.
pub(super) enum Abort {
    /// A store, transform or recovery step failed; surfaced to the consumer.
    Failed(CachineError),
    /// The consumer dropped the event stream.
    Disconnected,
}

impl From<CachineError> for Abort {
    fn from(err: CachineError) -> Self {
        Abort::Failed(err)
    }
}

/// Push one event, noticing a departed consumer.
pub(super) async fn emit(tx: &EventSender, event: RequestEvent) -> Result<(), Abort> {
    tx.send(Ok(event)).await.map_err(|_| Abort::Disconnected)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Init,
    Statting,
    RecoveringMiss,
    ServingFromCache,
    Regenerating,
    Done,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Init => "init",
            SessionState::Statting => "statting",
            SessionState::RecoveringMiss => "recovering_miss",
            SessionState::ServingFromCache => "serving_from_cache",
            SessionState::Regenerating => "regenerating",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        })
    }
}

/// How a request ended, as reported to metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Served,
    Regenerated,
    Failed,
    Abandoned,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Served => "served",
            Outcome::Regenerated => "regenerated",
            Outcome::Failed => "failed",
            Outcome::Abandoned => "abandoned",
        }
    }
}

/// State of one request, from key resolution to its terminal event.
pub(super) struct RequestSession<P> {
    shared: Arc<Shared<P>>,
    key: ResourceKey,
    cache_key: CacheKey,
    properties: P,
    predicates: Predicates,
    tx: EventSender,
    state: SessionState,
    started: Instant,
}

impl<P: Send + Sync + 'static> RequestSession<P> {
    pub(super) fn new(
        shared: Arc<Shared<P>>,
        key: ResourceKey,
        cache_key: CacheKey,
        properties: P,
        predicates: Predicates,
        tx: EventSender,
    ) -> Self {
        Self {
            shared,
            key,
            cache_key,
            properties,
            predicates,
            tx,
            state: SessionState::Init,
            started: Instant::now(),
        }
    }

    /// Drive the request to exactly one terminal signal.
    pub(super) async fn run(mut self) {
        let departed = self.tx.clone();
        let result = tokio::select! {
            biased;
            result = self.drive() => result,
            () = departed.closed() => Err(Abort::Disconnected),
        };

        let (outcome, bytes) = match result {
            Ok((outcome, bytes)) => match emit(&self.tx, RequestEvent::End).await {
                Ok(()) => {
                    self.transition(SessionState::Done);
                    (outcome, bytes)
                }
                Err(_) => (Outcome::Abandoned, bytes),
            },
            Err(Abort::Failed(err)) => {
                self.transition(SessionState::Failed);
                warn!(
                    key = %self.key,
                    cache_key = %self.cache_key,
                    error = %err,
                    "request failed"
                );
                // The consumer may already be gone.
                let _ = self.tx.send(Err(err)).await;
                (Outcome::Failed, 0)
            }
            Err(Abort::Disconnected) => {
                debug!(cache_key = %self.cache_key, state = %self.state, "consumer dropped stream");
                (Outcome::Abandoned, 0)
            }
        };

        self.record(outcome, bytes);
    }

    async fn drive(&mut self) -> Result<(Outcome, u64), Abort> {
        self.transition(SessionState::Statting);
        let (origin, cache) = tokio::join!(
            self.shared.origin.stat(self.key.as_str()),
            self.shared.cache.stat(self.cache_key.as_str()),
        );

        match (origin, cache) {
            (Ok(origin), Ok(cache)) => {
                let valid = self.announce(origin.mod_time).await?;
                if not_after(origin.mod_time, cache.mod_time) {
                    self.transition(SessionState::ServingFromCache);
                    let bytes = self.serve_from_cache(valid).await?;
                    Ok((Outcome::Served, bytes))
                } else {
                    metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "reason" => "stale")
                        .increment(1);
                    let bytes = self.regenerate(origin.mod_time, valid).await?;
                    Ok((Outcome::Regenerated, bytes))
                }
            }
            (Ok(_), Err(err)) if err.is_cache_miss() => {
                self.transition(SessionState::RecoveringMiss);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "reason" => "absent")
                    .increment(1);
                // Single retry: a failure here is final.
                let origin = self.shared.origin.stat(self.key.as_str()).await?;
                let valid = self.announce(origin.mod_time).await?;
                let bytes = self.regenerate(origin.mod_time, valid).await?;
                Ok((Outcome::Regenerated, bytes))
            }
            (Err(err), _) | (_, Err(err)) => Err(err.into()),
        }
    }

    /// Emit `Hit` and `Meta` for the origin's modification time.
    ///
    /// Returns whether the caller's own copy is current.
    async fn announce(&mut self, origin_mod_time: SystemTime) -> Result<bool, Abort> {
        let valid = self
            .predicates
            .min_mod_time
            .is_some_and(|held| not_after(origin_mod_time, held));
        if valid {
            metrics::counter!(telemetry::CALLER_HITS_TOTAL).increment(1);
        }

        emit(&self.tx, RequestEvent::Hit(valid)).await?;
        emit(
            &self.tx,
            RequestEvent::Meta(Meta {
                mod_time: origin_mod_time,
            }),
        )
        .await?;
        Ok(valid)
    }

    /// Stream the cached variant. With `valid` set the stream is still read
    /// to the end so a broken entry surfaces, but nothing is forwarded.
    async fn serve_from_cache(&mut self, valid: bool) -> Result<u64, Abort> {
        let mut chunks = self
            .shared
            .cache
            .open_read(self.cache_key.as_str())
            .await?;

        let mut bytes = 0u64;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            bytes += chunk.len() as u64;
            if !valid {
                emit(&self.tx, RequestEvent::Data(chunk)).await?;
            }
        }

        metrics::counter!(telemetry::BYTES_TOTAL, "path" => "cache").increment(bytes);
        Ok(bytes)
    }

    /// Regenerate the variant from the origin through the processor, writing
    /// it to the cache and (unless `valid`) to the consumer.
    ///
    /// The cache entry's modification time is then set to `origin_mod_time`,
    /// the origin time observed before regeneration started. With `valid`
    /// set nothing is forwarded, so the work runs on its own task and
    /// completes even if the consumer stops listening.
    async fn regenerate(&mut self, origin_mod_time: SystemTime, valid: bool) -> Result<u64, Abort> {
        self.transition(SessionState::Regenerating);

        let processor = self.shared.processor.name().to_owned();
        metrics::counter!(telemetry::REGENERATIONS_TOTAL, "processor" => processor.clone())
            .increment(1);
        debug!(cache_key = %self.cache_key, processor = %processor, valid, "regenerating");

        let job = Regeneration {
            origin: self.shared.origin.clone(),
            cache: self.shared.cache.clone(),
            key: self.key.clone(),
            cache_key: self.cache_key.clone(),
            origin_mod_time,
            transform: self.shared.processor.process(&self.properties),
        };

        let bytes = if valid {
            tokio::spawn(job.run(None))
                .await
                .map_err(|e| CachineError::Transform(format!("regeneration task failed: {e}")))??
        } else {
            job.run(Some(&self.tx)).await?
        };

        metrics::counter!(telemetry::BYTES_TOTAL, "path" => "regenerate").increment(bytes);
        Ok(bytes)
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            cache_key = %self.cache_key,
            state = %next,
            from = %self.state,
            "session transition"
        );
        self.state = next;
    }

    fn record(&self, outcome: Outcome, bytes: u64) {
        let elapsed = self.started.elapsed();
        metrics::counter!(telemetry::REQUESTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "outcome" => outcome.as_str())
            .record(elapsed.as_secs_f64());

        if matches!(outcome, Outcome::Served | Outcome::Regenerated) {
            info!(
                key = %self.key,
                cache_key = %self.cache_key,
                outcome = outcome.as_str(),
                bytes,
                elapsed_ms = elapsed.as_millis() as u64,
                "request complete"
            );
        }
    }
}
