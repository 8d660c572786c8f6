//! BLE transport for unotebook.
//!
//! A byte-command REPL over one GATT characteristic. Script output is
//! notified to the connected central in fragments no larger than
//! [`NOTIFY_SIZE`].
//!
//! # Module Structure
//!
//! - `gatt` - Hardware seam and service constants
//! - `channel` - Fragmenting notify channel
//! - `repl` - Command state machine

pub mod channel;
pub mod error;
pub mod gatt;
pub mod repl;

pub use channel::BleChannel;
pub use error::{BleError, Result};
pub use gatt::{COMMAND_CHAR_UUID, DEVICE_NAME, GattServer, NOTIFY_SIZE, SERVICE_UUID};
pub use repl::{Command, GattRepl, PROMPT, ReplState, STOP_BANNER, UNKNOWN_MARKER, start_banner};
