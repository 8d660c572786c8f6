//! HTTP backend of the streaming output channel.
//!
//! A cell runs on a blocking worker thread while the response body is
//! produced on the async side; [`HttpChannel`] bridges the two with a
//! bounded queue so a slow client applies backpressure to the cell.

use std::io;

use axum::body::Bytes;
use tokio::sync::mpsc;
use unotebook_core::OutputChannel;

use crate::error::ServerError;

/// Chunks buffered between a running cell and its response body.
pub const CHANNEL_CAPACITY: usize = 32;

/// Item of a streamed response body.
pub type BodyChunk = Result<Bytes, ServerError>;

/// Sends output of a running cell into a response body.
#[derive(Debug, Clone)]
pub struct HttpChannel {
    tx: mpsc::Sender<BodyChunk>,
}

impl HttpChannel {
    /// Create a channel and the receiving end the body is built from.
    pub fn new() -> (Self, mpsc::Receiver<BodyChunk>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    /// Abort the body with `error`.
    ///
    /// Must be called from a blocking thread, like [`OutputChannel::send`].
    pub fn fail(&self, error: ServerError) {
        if self.tx.blocking_send(Err(error)).is_err() {
            tracing::debug!("Client gone before failure could be reported");
        }
    }
}

impl OutputChannel for HttpChannel {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(bytes)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_arrive_in_order() {
        let (mut channel, mut rx) = HttpChannel::new();
        std::thread::spawn(move || {
            channel.send_text("a").unwrap();
            channel.send_bytes_as_base64(b"hi").unwrap();
        })
        .join()
        .unwrap();

        let mut received = Vec::new();
        while let Some(chunk) = rx.blocking_recv() {
            received.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(received, b"aaGk=");
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (mut channel, rx) = HttpChannel::new();
        drop(rx);
        let err = channel.send_text("late").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
