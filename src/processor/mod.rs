//! Streaming transforms applied when a cache entry is regenerated.
//!
//! A [`Processor`] is a factory: given the request's properties it builds a
//! fresh [`Transform`], which consumes the origin's byte stream and produces
//! the derived bytes. Construction is synchronous and has no side effects;
//! all work (and every failure) happens while the output stream is polled.

mod command;
mod imagemagick;

pub use command::CommandTransform;
pub use imagemagick::ImageMagickProcessor;

use crate::types::ChunkStream;

/// A one-shot byte stream transform.
///
/// Failures surface as `Err` items on the returned stream.
///
/// Closures taking and returning a [`ChunkStream`] are transforms.
pub trait Transform: Send {
    fn apply(self: Box<Self>, input: ChunkStream) -> ChunkStream;
}

impl<F> Transform for F
where
    F: FnOnce(ChunkStream) -> ChunkStream + Send,
{
    fn apply(self: Box<Self>, input: ChunkStream) -> ChunkStream {
        (*self)(input)
    }
}

/// Builds the transform for a set of properties.
pub trait Processor<P>: Send + Sync {
    /// Processor name for logging/metrics.
    fn name(&self) -> &str;

    fn process(&self, properties: &P) -> Box<dyn Transform>;
}

/// Passes bytes through unchanged, whatever the properties.
///
/// Useful when the cache store is a plain mirror of the origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProcessor;

impl IdentityProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl<P> Processor<P> for IdentityProcessor {
    fn name(&self) -> &str {
        "identity"
    }

    fn process(&self, _properties: &P) -> Box<dyn Transform> {
        Box::new(|input: ChunkStream| input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::{StreamExt, stream};

    fn chunks(items: &[&'static [u8]]) -> ChunkStream {
        Box::pin(stream::iter(
            items.iter().map(|c| Ok(Bytes::from_static(c))).collect::<Vec<_>>(),
        ))
    }

    #[tokio::test]
    async fn identity_passes_chunks_through() {
        let transform = Processor::<()>::process(&IdentityProcessor, &());
        let out: Vec<_> = transform
            .apply(chunks(&[b"ab", b"cd"]))
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(out, vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cd")]);
    }

    #[tokio::test]
    async fn closures_are_transforms() {
        let upper: Box<dyn Transform> = Box::new(|input: ChunkStream| -> ChunkStream {
            Box::pin(input.map(|c| c.map(|b| Bytes::from(b.to_ascii_uppercase()))))
        });
        let out: Vec<_> = upper
            .apply(chunks(&[b"ab"]))
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(out, vec![Bytes::from_static(b"AB")]);
    }
}
