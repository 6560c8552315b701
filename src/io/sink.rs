use std::io;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use super::{ArchiveSink, FlushableSink};

/// Bytes gathered before a chunk is sent without an explicit flush.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Chunks that may wait in the channel before writers are suspended.
pub const CHANNEL_DEPTH: usize = 4;

/// Sink feeding a bounded channel, typically drained by an HTTP body.
///
/// Once the receiver is gone every write fails with `BrokenPipe`.
pub struct ChannelSink {
    tx: mpsc::Sender<io::Result<Bytes>>,
    pending: BytesMut,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self {
            tx,
            pending: BytesMut::with_capacity(CHUNK_SIZE),
        }
    }

    /// Create a sink together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::Receiver<io::Result<Bytes>>) {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        (Self::new(tx), rx)
    }

    /// Terminate the stream with an error instead of a clean end.
    ///
    /// Pending bytes are discarded. The receiver sees `Err(error)` as its
    /// last item.
    pub async fn abort(mut self, error: io::Error) {
        self.pending.clear();
        // Nothing to do if the receiver is already gone.
        let _ = self.tx.send(Err(error)).await;
    }

    async fn send_pending(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = self.pending.split().freeze();
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "archive receiver closed"))
    }
}

#[async_trait]
impl ArchiveSink for ChannelSink {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.tx.is_closed() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "archive receiver closed",
            ));
        }
        self.pending.extend_from_slice(buf);
        if self.pending.len() >= CHUNK_SIZE {
            self.send_pending().await?;
        }
        Ok(())
    }

    fn as_flushable(&mut self) -> Option<&mut dyn FlushableSink> {
        Some(self)
    }
}

#[async_trait]
impl FlushableSink for ChannelSink {
    async fn flush(&mut self) -> io::Result<()> {
        self.send_pending().await
    }
}
