//! Bounded channel sink
//!
//! [`ChannelSink`] hands the stream to another thread in chunks over a
//! bounded crossbeam channel. Bytes are buffered until `flush()` or until the
//! buffer reaches the configured chunk size. When the channel is full the
//! writer blocks, which pauses the engine and with it the row cursor.
//!
//! Dropping the receiver cancels the stream: the next send fails with
//! [`io::ErrorKind::BrokenPipe`] and the engine aborts.

use crate::config::SinkSettings;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{self, Write};

/// Writer half of a chunked byte channel.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<Vec<u8>>,
    buf: Vec<u8>,
    chunk_bytes: usize,
    chunks_sent: u64,
}

/// Create a sink and the receiver that drains it.
pub fn channel_sink(settings: &SinkSettings) -> (ChannelSink, Receiver<Vec<u8>>) {
    let (tx, rx) = bounded(settings.channel_depth.max(1));
    (ChannelSink::new(tx, settings.chunk_bytes), rx)
}

impl ChannelSink {
    pub fn new(tx: Sender<Vec<u8>>, chunk_bytes: usize) -> Self {
        let chunk_bytes = chunk_bytes.max(1);
        Self {
            tx,
            buf: Vec::with_capacity(chunk_bytes),
            chunk_bytes,
            chunks_sent: 0,
        }
    }

    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent
    }

    /// Bytes buffered but not yet sent.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn send_buffer(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buf, Vec::with_capacity(self.chunk_bytes));
        self.tx
            .send(chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "stream receiver dropped"))?;
        self.chunks_sent += 1;
        Ok(())
    }
}

impl Write for ChannelSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= self.chunk_bytes {
            self.send_buffer()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffer()
    }
}

impl Drop for ChannelSink {
    fn drop(&mut self) {
        if let Err(e) = self.send_buffer() {
            tracing::debug!("Discarding {} unsent bytes: {}", self.buf.len(), e);
        }
    }
}
