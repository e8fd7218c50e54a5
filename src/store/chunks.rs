//! Adapter from `AsyncRead` to a stream of `Bytes` chunks.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::{StoreError, StoreResult};

/// Default read size for file and pipe streams.
pub(crate) const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

pin_project! {
    /// Reads an `AsyncRead` in chunks of at most `buf.len()` bytes.
    ///
    /// Ends after the first zero-length read or the first error.
    pub(crate) struct ReaderChunks<R> {
        #[pin]
        reader: R,
        buf: Box<[u8]>,
        key: String,
        done: bool,
    }
}

impl<R: AsyncRead> ReaderChunks<R> {
    pub(crate) fn new(reader: R, key: impl Into<String>) -> Self {
        Self::with_chunk_size(reader, key, DEFAULT_CHUNK_SIZE)
    }

    pub(crate) fn with_chunk_size(reader: R, key: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            reader,
            buf: vec![0u8; chunk_size.max(1)].into_boxed_slice(),
            key: key.into(),
            done: false,
        }
    }
}

impl<R: AsyncRead> Stream for ReaderChunks<R> {
    type Item = StoreResult<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        let mut read_buf = ReadBuf::new(this.buf);
        match this.reader.poll_read(cx, &mut read_buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(())) => {
                let filled = read_buf.filled();
                if filled.is_empty() {
                    *this.done = true;
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Ok(Bytes::copy_from_slice(filled))))
                }
            }
            Poll::Ready(Err(e)) => {
                *this.done = true;
                Poll::Ready(Some(Err(StoreError::io(this.key.clone(), e))))
            }
        }
    }
}
