mod memory;
mod s3;
mod sigv4;
mod sink;

pub use memory::MemoryStore;
pub use s3::{S3Client, S3Config};
pub use sigv4::SigningKey;
pub use sink::{CHANNEL_DEPTH, CHUNK_SIZE, ChannelSink};

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Byte stream of one stored object. Dropping it releases the connection.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Trait for reading whole objects from a bucketed store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open a stream over the object `key` in `bucket`
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader>;
}

/// Destination for archive bytes
#[async_trait]
pub trait ArchiveSink: Send {
    /// Write the whole buffer or fail
    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;

    /// The flush capability, if this sink can push bytes on to its transport
    fn as_flushable(&mut self) -> Option<&mut dyn FlushableSink> {
        None
    }
}

/// Sinks that hold bytes back until told to pass them on
#[async_trait]
pub trait FlushableSink: Send {
    async fn flush(&mut self) -> std::io::Result<()>;
}

#[async_trait]
impl ArchiveSink for Vec<u8> {
    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }
}

#[async_trait]
impl<T: ArchiveSink + ?Sized> ArchiveSink for &mut T {
    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        (**self).write_all(buf).await
    }

    fn as_flushable(&mut self) -> Option<&mut dyn FlushableSink> {
        (**self).as_flushable()
    }
}
