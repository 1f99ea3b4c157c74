//! Inbound byte stream with suspending reads.
//!
//! The transport side holds a [`ByteSink`] and appends chunks as they arrive;
//! the decoder owns the matching [`ByteSource`] and suspends until enough
//! bytes are buffered or the session is ended.

use std::collections::VecDeque;
use tokio::sync::mpsc;

use crate::{Error, Result};

/// One event delivered from the sink to the source.
#[derive(Debug)]
enum Feed {
    Data(Vec<u8>),
    End,
}

/// Creates a connected sink/source pair for one session.
pub fn channel() -> (ByteSink, ByteSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ByteSink { tx },
        ByteSource {
            rx,
            buffer: VecDeque::new(),
            ended: false,
        },
    )
}

/// Producer half of a session's byte stream.
#[derive(Debug, Clone)]
pub struct ByteSink {
    tx: mpsc::UnboundedSender<Feed>,
}

impl ByteSink {
    /// Appends a chunk of bytes. Returns false once the consumer is gone.
    pub fn push(&self, bytes: Vec<u8>) -> bool {
        self.try_push(bytes).is_ok()
    }

    /// Appends a chunk of bytes, handing them back if the consumer is gone.
    pub fn try_push(&self, bytes: Vec<u8>) -> std::result::Result<(), Vec<u8>> {
        self.tx.send(Feed::Data(bytes)).map_err(|e| match e.0 {
            Feed::Data(bytes) => bytes,
            Feed::End => Vec::new(),
        })
    }

    /// Signals that no more bytes will arrive for this session.
    pub fn end(&self) {
        let _ = self.tx.send(Feed::End);
    }
}

/// Consumer half of a session's byte stream.
#[derive(Debug)]
pub struct ByteSource {
    rx: mpsc::UnboundedReceiver<Feed>,
    buffer: VecDeque<u8>,
    ended: bool,
}

impl ByteSource {
    /// Suspends until more bytes have been appended (true) or the session
    /// has ended (false). Each appended chunk resolves exactly one wait.
    pub async fn await_available(&mut self) -> bool {
        if self.ended {
            return false;
        }
        loop {
            match self.rx.recv().await {
                Some(Feed::Data(bytes)) if bytes.is_empty() => continue,
                Some(Feed::Data(bytes)) => {
                    self.buffer.extend(bytes);
                    return true;
                }
                Some(Feed::End) | None => {
                    self.ended = true;
                    return false;
                }
            }
        }
    }

    /// Returns true if at least one byte can be read without the session
    /// ending first. Used at packet boundaries.
    pub async fn has_more(&mut self) -> bool {
        if !self.buffer.is_empty() {
            return true;
        }
        self.await_available().await
    }

    /// Removes and returns exactly `n` bytes, suspending until they exist.
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        while self.buffer.len() < n {
            if !self.await_available().await {
                return Err(Error::TruncatedStream {
                    needed: n,
                    available: self.buffer.len(),
                });
            }
        }
        Ok(self.buffer.drain(..n).collect())
    }

    /// Discards bytes until the buffer starts with `pattern`.
    ///
    /// Returns the number of bytes discarded, or `None` if the session ended
    /// before the pattern appeared.
    pub async fn skip_until(&mut self, pattern: &[u8]) -> Option<usize> {
        let mut skipped = 0;
        loop {
            while self.buffer.len() >= pattern.len() {
                if self.buffer.iter().zip(pattern).all(|(a, b)| a == b) {
                    return Some(skipped);
                }
                self.buffer.pop_front();
                skipped += 1;
            }
            if !self.await_available().await {
                return None;
            }
        }
    }

    /// Reads one byte.
    pub async fn read_u8(&mut self) -> Result<u8> {
        let bytes = self.read_exact(1).await?;
        Ok(bytes[0])
    }

    /// Reads a little-endian 16-bit word.
    pub async fn read_u16_le(&mut self) -> Result<u16> {
        let bytes = self.read_exact(2).await?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Number of bytes buffered but not yet read.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true once the end-of-session signal has been observed.
    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_across_chunks() {
        let (sink, mut source) = channel();
        sink.push(vec![0x88]);
        sink.push(vec![0x33, 0x01]);

        assert_eq!(source.read_u16_le().await.unwrap(), 0x3388);
        assert_eq!(source.read_u8().await.unwrap(), 0x01);
        assert_eq!(source.buffered(), 0);
    }

    #[tokio::test]
    async fn test_end_truncates_read() {
        let (sink, mut source) = channel();
        sink.push(vec![1, 2, 3]);
        sink.end();

        match source.read_exact(5).await {
            Err(Error::TruncatedStream { needed, available }) => {
                assert_eq!(needed, 5);
                assert_eq!(available, 3);
            }
            other => panic!("expected truncation, got {:?}", other),
        }
        assert!(source.is_ended());
        assert!(!source.await_available().await);
    }

    #[tokio::test]
    async fn test_empty_chunks_are_not_data() {
        let (sink, mut source) = channel();
        sink.push(Vec::new());
        sink.push(vec![7]);
        assert!(source.await_available().await);
        assert_eq!(source.buffered(), 1);
    }

    #[tokio::test]
    async fn test_has_more_drains_buffer_first() {
        let (sink, mut source) = channel();
        sink.push(vec![1, 2]);
        sink.end();

        assert!(source.has_more().await);
        source.read_u8().await.unwrap();
        assert!(source.has_more().await);
        source.read_u8().await.unwrap();
        assert!(!source.has_more().await);
    }

    #[tokio::test]
    async fn test_skip_until_pattern() {
        let (sink, mut source) = channel();
        sink.push(vec![0xDE, 0xAD, 0x88]);
        sink.push(vec![0x33, 0x01]);

        assert_eq!(source.skip_until(&[0x88, 0x33]).await, Some(2));
        assert_eq!(source.read_u16_le().await.unwrap(), 0x3388);

        sink.push(vec![0x00, 0x88]);
        sink.end();
        assert_eq!(source.skip_until(&[0x88, 0x33]).await, None);
    }

    #[test]
    fn test_try_push_returns_bytes_when_closed() {
        let (sink, source) = channel();
        drop(source);
        assert_eq!(sink.try_push(vec![1, 2]), Err(vec![1, 2]));
        assert!(!sink.push(vec![3]));
    }

    #[tokio::test]
    async fn test_dropped_sink_ends_session() {
        let (sink, mut source) = channel();
        drop(sink);
        assert!(!source.await_available().await);
    }
}
