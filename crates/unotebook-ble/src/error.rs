//! Error types for unotebook-ble.

use thiserror::Error;

/// Result type for BLE operations.
pub type Result<T> = std::result::Result<T, BleError>;

/// Errors raised by the GATT transport.
///
/// Script failures never appear here; the REPL reports them in-band.
#[derive(Debug, Error)]
pub enum BleError {
    /// A notification could not be sent.
    #[error("notify failed: {0}")]
    Notify(String),

    /// Advertising could not be (re)started.
    #[error("advertising failed: {0}")]
    Advertise(String),
}
