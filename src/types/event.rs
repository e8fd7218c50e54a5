//! Request output types

use std::pin::Pin;
use std::time::SystemTime;

use bytes::Bytes;
use futures_util::Stream;

use crate::Result;

/// Result of a `stat` call on a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatResult {
    pub mod_time: SystemTime,
}

impl StatResult {
    pub fn new(mod_time: SystemTime) -> Self {
        Self { mod_time }
    }
}

/// Resource metadata, available before the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meta {
    /// Modification time of the original resource.
    pub mod_time: SystemTime,
}

/// Events emitted while answering a request.
///
/// A successful request yields `Hit`, `Meta`, zero or more `Data`, then
/// `End`. A failure is delivered as the stream's `Err` item instead of the
/// remaining events; nothing follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEvent {
    /// Whether the caller's own copy is already current. Always first.
    Hit(bool),

    /// Metadata of the original resource. Always second.
    Meta(Meta),

    /// Payload chunk. Never emitted after `Hit(true)`.
    Data(Bytes),

    /// Request complete.
    End,
}

/// Payload chunks flowing between stores, transforms and the tee.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Ordered event stream for one request.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RequestEvent>> + Send>>;
