//! Byte Stream Module
//!
//! Payload streams exchanged with callers. Payload bytes are never inspected.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::{CacheError, Result};

/// Chunk size used when streaming cache files from disk.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Owned, sendable stream of payload chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Wraps an in-memory payload into a single-chunk stream.
pub fn from_bytes(data: impl Into<Bytes>) -> ByteStream {
    let data = data.into();
    stream::once(async move { Ok(data) }).boxed()
}

/// Drains a stream into one contiguous buffer.
pub async fn collect_bytes(stream: ByteStream) -> Result<Bytes> {
    let chunks: Vec<Bytes> = stream.try_collect().await?;
    if chunks.len() == 1 {
        return Ok(chunks.into_iter().next().unwrap_or_default());
    }

    let mut buf = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
    for chunk in chunks {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Lazily reads an open file in `READ_CHUNK_SIZE` chunks.
pub(crate) fn from_file(file: File) -> ByteStream {
    stream::try_unfold(file, |mut file| async move {
        let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
        let read = file.read_buf(&mut buf).await.map_err(CacheError::from)?;
        if read == 0 {
            return Ok(None);
        }
        Ok::<_, CacheError>(Some((buf.freeze(), file)))
    })
    .boxed()
}
