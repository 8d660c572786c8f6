//! BLE backend of the streaming output channel.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use unotebook_core::{OutputChannel, OutputSink};

use crate::error::{BleError, Result};
use crate::gatt::{GattServer, NOTIFY_SIZE};

/// Sends bytes to the connected central as notifications.
///
/// Writes are split into [`NOTIFY_SIZE`] fragments. With no central
/// connected, output is dropped.
pub struct BleChannel<G> {
    gatt: Arc<Mutex<G>>,
}

impl<G> Clone for BleChannel<G> {
    fn clone(&self) -> Self {
        Self {
            gatt: self.gatt.clone(),
        }
    }
}

impl<G: GattServer> BleChannel<G> {
    /// Wrap `gatt`; clones share it.
    pub fn new(gatt: G) -> Self {
        Self {
            gatt: Arc::new(Mutex::new(gatt)),
        }
    }

    /// Lock the underlying server.
    pub fn gatt(&self) -> MutexGuard<'_, G> {
        self.gatt.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Notify `data`, fragmenting as needed.
    pub fn notify(&self, data: &[u8]) -> Result<()> {
        let mut gatt = self.gatt();
        if !gatt.is_connected() {
            tracing::trace!("No central connected, dropping {} bytes", data.len());
            return Ok(());
        }
        for fragment in data.chunks(NOTIFY_SIZE) {
            gatt.notify(fragment)
                .map_err(|e| BleError::Notify(format!("{:?}", e)))?;
        }
        Ok(())
    }
}

impl<G: GattServer> OutputChannel for BleChannel<G> {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.notify(bytes).map_err(io::Error::other)
    }
}

impl<G: GattServer + 'static> OutputSink for BleChannel<G> {
    fn write(&mut self, text: &str) {
        if let Err(e) = self.notify(text.as_bytes()) {
            tracing::warn!("Dropping script output: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        connected: bool,
        sent: Vec<Vec<u8>>,
    }

    impl GattServer for Recorder {
        type Error = ();

        fn start_advertising(&mut self, _device_name: &str) -> std::result::Result<(), ()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn notify(&mut self, data: &[u8]) -> std::result::Result<(), ()> {
            self.sent.push(data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_fragments_to_notify_size() {
        let channel = BleChannel::new(Recorder {
            connected: true,
            ..Recorder::default()
        });
        channel.notify(&[7u8; 400]).unwrap();

        let sizes: Vec<usize> = channel.gatt().sent.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![180, 180, 40]);
    }

    #[test]
    fn test_drops_when_disconnected() {
        let channel = BleChannel::new(Recorder::default());
        channel.notify(b"lost").unwrap();
        assert!(channel.gatt().sent.is_empty());
    }

    #[test]
    fn test_base64_goes_out_in_fragments() {
        let mut channel = BleChannel::new(Recorder {
            connected: true,
            ..Recorder::default()
        });
        channel.send_bytes_as_base64(&[1u8; 57]).unwrap();
        assert_eq!(channel.gatt().sent.len(), 1);
        assert_eq!(channel.gatt().sent[0].len(), 76);
    }
}
