//! Streaming output channel.
//!
//! An [`OutputChannel`] pushes partial data to a client as soon as it is
//! produced. Transports implement [`OutputChannel::send`]; text and base64
//! helpers are layered on top so that every transport frames data
//! identically.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Source bytes encoded per base64 chunk (one canonical 76-column line).
pub const BASE64_CHUNK: usize = 57;

/// Encoded width of a full [`BASE64_CHUNK`].
const BASE64_LINE: usize = 76;

/// A channel that delivers bytes to a client incrementally.
pub trait OutputChannel {
    /// Deliver raw bytes.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Deliver UTF-8 text.
    fn send_text(&mut self, text: &str) -> io::Result<()> {
        self.send(text.as_bytes())
    }

    /// Deliver `buf` base64-encoded, one [`BASE64_CHUNK`] at a time.
    ///
    /// The encoded form never exists in full; peak memory is one encoded
    /// line regardless of payload size. Chunks carry no line terminators.
    fn send_bytes_as_base64(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut line = [0u8; BASE64_LINE];
        for chunk in buf.chunks(BASE64_CHUNK) {
            let written = STANDARD
                .encode_slice(chunk, &mut line)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            self.send(&line[..written])?;
        }
        Ok(())
    }
}

impl<C: OutputChannel + ?Sized> OutputChannel for &mut C {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).send(bytes)
    }
}

/// Collects everything sent, for tests and buffering callers.
impl OutputChannel for Vec<u8> {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Channel over any [`Write`], flushing after every send.
#[derive(Debug)]
pub struct WriterChannel<W> {
    writer: W,
}

impl<W: Write> WriterChannel<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputChannel for WriterChannel<W> {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }
}

/// In-memory channel whose clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferChannel {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl BufferChannel {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything sent so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Everything sent so far, lossily decoded as UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl OutputChannel for BufferChannel {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
        Ok(())
    }
}
