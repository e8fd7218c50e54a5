//! The cache orchestrator.
//!
//! [`Orchestrator::request`] answers one request for a derived resource. It
//! stats the origin and cache stores concurrently, decides whether the
//! cached variant is fresh, and then either streams the cached bytes or
//! regenerates the variant from the origin, writing it to the cache and to
//! the caller in a single pass.
//!
//! # Event contract
//!
//! Each request yields, in order:
//!
//! 1. [`RequestEvent::Hit`](crate::RequestEvent::Hit) with the caller-relative validity,
//! 2. [`RequestEvent::Meta`](crate::RequestEvent::Meta) with the origin's modification time,
//! 3. zero or more [`RequestEvent::Data`](crate::RequestEvent::Data), never
//!    after `Hit(true)`,
//! 4. [`RequestEvent::End`](crate::RequestEvent::End),
//!
//! or stops at the first `Err` item, which may arrive before `Hit` when the
//! stat phase fails. Nothing follows `End` or an error.
//!
//! # Cancellation
//!
//! Dropping the [`EventStream`] cancels the request at its next suspension
//! point. Open store handles are released; a partially regenerated cache
//! entry is abandoned. The exception is a regeneration for a caller whose
//! copy is already current (`Hit(true)`): it forwards no data and runs to
//! completion on its own task, so the cache entry is refreshed even when
//! the consumer stops listening right after `Meta`.

mod builder;
mod session;
mod tee;

pub use builder::{Cachine, CachineBuilder};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::processor::Processor;
use crate::resolver::Resolver;
use crate::store::RoleStore;
use crate::types::{EventStream, Predicates, ResourceKey};

use session::RequestSession;

/// Default number of events buffered between a session and its consumer.
pub const DEFAULT_STREAM_BUFFER: usize = 64;

/// Collaborators shared by every session of one orchestrator.
pub(crate) struct Shared<P> {
    pub(crate) origin: RoleStore,
    pub(crate) cache: RoleStore,
    pub(crate) resolver: Arc<dyn Resolver<P>>,
    pub(crate) processor: Arc<dyn Processor<P>>,
    pub(crate) stream_buffer: usize,
}

/// Read-through, write-through cache for derived resources.
///
/// Cheap to clone; clones share the same stores and collaborators. Requests
/// are independent: there is no coalescing of concurrent requests for the
/// same variant, so two of them may both regenerate it.
///
/// Built with [`Cachine::builder`] or from a [`Config`](crate::Config).
pub struct Orchestrator<P> {
    shared: Arc<Shared<P>>,
}

impl<P> Clone for Orchestrator<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: Send + Sync + 'static> Orchestrator<P> {
    pub(crate) fn new(shared: Shared<P>) -> Self {
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Request `key` transformed according to `properties`.
    ///
    /// The cache key is resolved before this returns; all I/O happens on a
    /// spawned task feeding the returned stream.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn request(
        &self,
        key: impl Into<ResourceKey>,
        properties: P,
        predicates: Predicates,
    ) -> EventStream {
        let key = key.into();
        let cache_key = self.shared.resolver.resolve(&key, &properties);
        debug!(key = %key, cache_key = %cache_key, "resolved cache key");

        let (tx, rx) = mpsc::channel(self.shared.stream_buffer);
        let session = RequestSession::new(
            Arc::clone(&self.shared),
            key,
            cache_key,
            properties,
            predicates,
            tx,
        );
        tokio::spawn(session.run());

        Box::pin(ReceiverStream::new(rx))
    }

    /// Origin store handle.
    pub fn origin(&self) -> &RoleStore {
        &self.shared.origin
    }

    /// Cache store handle.
    pub fn cache(&self) -> &RoleStore {
        &self.shared.cache
    }

    /// Name of the configured processor.
    pub fn processor_name(&self) -> &str {
        self.shared.processor.name()
    }
}
