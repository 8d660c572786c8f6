//! GATT server abstraction.
//!
//! The REPL talks to the radio through [`GattServer`]; platform layers
//! implement it on top of their BLE stack.
//!
//! ```text
//! central ──write──▶ command characteristic ──▶ GattRepl::handle_write
//! central ◀─notify── command characteristic ◀── BleChannel (≤ 180 bytes each)
//! ```

use core::fmt::Debug;

/// Largest payload of one notification.
pub const NOTIFY_SIZE: usize = 180;

/// Name advertised when no other is configured.
pub const DEVICE_NAME: &str = "unotebook";

/// Service UUID: c5f50001-8280-46da-89f4-6d8051e4aeef
pub const SERVICE_UUID: [u8; 16] = [
    0xc5, 0xf5, 0x00, 0x01, 0x82, 0x80, 0x46, 0xda,
    0x89, 0xf4, 0x6d, 0x80, 0x51, 0xe4, 0xae, 0xef,
];

/// Command/event characteristic UUID: c5f50002-8280-46da-89f4-6d8051e4aeef
///
/// Write with and without response, plus notify.
pub const COMMAND_CHAR_UUID: [u8; 16] = [
    0xc5, 0xf5, 0x00, 0x02, 0x82, 0x80, 0x46, 0xda,
    0x89, 0xf4, 0x6d, 0x80, 0x51, 0xe4, 0xae, 0xef,
];

/// Peripheral-side GATT server with a single command characteristic.
///
/// Implementations must be `Send`: script output may be notified from
/// whichever thread runs the script.
pub trait GattServer: Send {
    /// Platform-specific error type
    type Error: Debug;

    /// Begin advertising as `device_name`.
    fn start_advertising(&mut self, device_name: &str) -> Result<(), Self::Error>;

    /// Whether a central is connected.
    fn is_connected(&self) -> bool;

    /// Notify the connected central. `data` is at most [`NOTIFY_SIZE`] bytes.
    fn notify(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}
