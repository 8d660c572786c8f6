//! GATT command state machine.
//!
//! Every write to the command characteristic starts with one command byte,
//! optionally followed by a payload:
//!
//! | Byte | Command | Effect |
//! |------|---------|--------|
//! | `0x02` | START | output to notifications, clear input, banner |
//! | `0x06` | WRITE_STDIN | append payload to the input buffer |
//! | `0x04` | RUN | run the buffered input, then prompt |
//! | `0x00` | STOP | restore output, stop banner |
//!
//! Anything else, including an empty write, is answered with `?`.

use unotebook_core::{OutputSink, OutputStream, ScriptEvaluator, VERSION};

use crate::channel::BleChannel;
use crate::error::{BleError, Result};
use crate::gatt::{DEVICE_NAME, GattServer};

/// Notified after every RUN.
pub const PROMPT: &str = ">>> ";

/// Notified for an unrecognized command.
pub const UNKNOWN_MARKER: &str = "?";

/// Notified on STOP.
pub const STOP_BANNER: &str = "\r\nrepl stopped\r\n";

/// Notified on START.
pub fn start_banner() -> String {
    format!("µNotebook {}\r\n", VERSION)
}

/// A command understood by the REPL.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StopRepl = 0x00,
    StartRepl = 0x02,
    Run = 0x04,
    WriteStdin = 0x06,
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Command::StopRepl),
            0x02 => Ok(Command::StartRepl),
            0x04 => Ok(Command::Run),
            0x06 => Ok(Command::WriteStdin),
            other => Err(other),
        }
    }
}

/// Protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplState {
    Idle,
    /// Script output is routed to notifications.
    Active,
}

/// REPL over a single GATT connection.
///
/// Scripts run against one environment shared by every RUN for the
/// lifetime of the REPL, across connections.
pub struct GattRepl<G: GattServer + 'static, E: ScriptEvaluator> {
    channel: BleChannel<G>,
    evaluator: E,
    output: OutputStream,
    env: E::Env,
    input: Vec<u8>,
    state: ReplState,
    /// Process-wide sink to reinstate on STOP.
    saved_sink: Option<Box<dyn OutputSink>>,
    device_name: String,
}

impl<G: GattServer + 'static, E: ScriptEvaluator> GattRepl<G, E> {
    /// Create a REPL. `output` must be the stream `evaluator` prints to.
    pub fn new(gatt: G, evaluator: E, output: OutputStream) -> Self {
        Self {
            channel: BleChannel::new(gatt),
            evaluator,
            output,
            env: E::Env::default(),
            input: Vec::new(),
            state: ReplState::Idle,
            saved_sink: None,
            device_name: DEVICE_NAME.to_string(),
        }
    }

    /// Advertise under `name` instead of the default.
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    /// Current protocol state.
    pub fn state(&self) -> ReplState {
        self.state
    }

    /// The shared script environment.
    pub fn env(&self) -> &E::Env {
        &self.env
    }

    /// Buffered, not yet run input.
    pub fn pending_input(&self) -> &[u8] {
        &self.input
    }

    /// Begin advertising under the configured name.
    pub fn start_advertising(&self) -> Result<()> {
        tracing::info!("Advertising as {}", self.device_name);
        self.channel
            .gatt()
            .start_advertising(&self.device_name)
            .map_err(|e| BleError::Advertise(format!("{:?}", e)))
    }

    /// Called by the transport when a central connects.
    pub fn on_connect(&mut self) {
        tracing::info!("Central connected");
    }

    /// Reset to idle and resume advertising.
    pub fn on_disconnect(&mut self) -> Result<()> {
        tracing::info!("Central disconnected");
        self.restore_output();
        self.input.clear();
        self.start_advertising()
    }

    /// Handle one write to the command characteristic.
    ///
    /// Errors are transport failures only; script failures are notified.
    pub fn handle_write(&mut self, data: &[u8]) -> Result<()> {
        let command = data.first().and_then(|&byte| Command::try_from(byte).ok());
        let payload = data.get(1..).unwrap_or_default();

        match command {
            Some(Command::StartRepl) => self.start(),
            Some(Command::WriteStdin) => {
                self.input.extend_from_slice(payload);
                Ok(())
            }
            Some(Command::Run) => self.run(),
            Some(Command::StopRepl) => self.stop(),
            None => {
                tracing::debug!("Unknown command {:?}", data.first());
                self.channel.notify(UNKNOWN_MARKER.as_bytes())
            }
        }
    }

    fn start(&mut self) -> Result<()> {
        if self.state == ReplState::Idle {
            self.saved_sink = Some(self.output.replace(Box::new(self.channel.clone())));
            self.state = ReplState::Active;
        }
        self.input.clear();
        tracing::debug!("REPL started");
        self.channel.notify(start_banner().as_bytes())
    }

    fn run(&mut self) -> Result<()> {
        let input = std::mem::take(&mut self.input);
        let source = String::from_utf8_lossy(&input);
        tracing::debug!("RUN {:?}", source);

        if let Err(e) = self.evaluator.run_statements(&mut self.env, &source) {
            tracing::warn!("Script failed: {}", e);
            self.channel.notify(format!("Error: {}\r\n", e).as_bytes())?;
        }
        self.channel.notify(PROMPT.as_bytes())
    }

    fn stop(&mut self) -> Result<()> {
        self.restore_output();
        tracing::debug!("REPL stopped");
        self.channel.notify(STOP_BANNER.as_bytes())
    }

    fn restore_output(&mut self) {
        if let Some(previous) = self.saved_sink.take() {
            self.output.replace(previous);
        }
        self.state = ReplState::Idle;
    }
}

impl<G: GattServer + 'static, E: ScriptEvaluator> Drop for GattRepl<G, E> {
    fn drop(&mut self) {
        self.restore_output();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_bytes() {
        for command in [
            Command::StartRepl,
            Command::WriteStdin,
            Command::Run,
            Command::StopRepl,
        ] {
            assert_eq!(Command::try_from(command as u8), Ok(command));
        }
        assert_eq!(Command::try_from(0x01), Err(0x01));
        assert_eq!(Command::try_from(0xff), Err(0xff));
    }

    #[test]
    fn test_banners_are_line_terminated() {
        assert!(start_banner().starts_with("µNotebook "));
        assert!(start_banner().contains(VERSION));
        assert!(start_banner().ends_with("\r\n"));
        assert!(STOP_BANNER.ends_with("\r\n"));
    }
}
