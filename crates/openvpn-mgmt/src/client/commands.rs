//! Typed wrappers for the supported subset of management commands.

use std::fmt;
use std::time::Duration;

use super::{ClientError, MgmtClient};
use crate::events::StateEvent;

const PID_PREFIX: &str = "pid=";

/// Signals that can be sent to the OpenVPN process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Restart the tunnel, re-reading configuration.
    Hup,
    /// Exit.
    Term,
    /// Soft restart without re-reading configuration.
    Usr1,
    /// Write status to the log.
    Usr2,
}

impl fmt::Display for Signal {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Hup => "SIGHUP",
            Self::Term => "SIGTERM",
            Self::Usr1 => "SIGUSR1",
            Self::Usr2 => "SIGUSR2",
        })
    }
}

/// Layout versions accepted by the `status` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFormat {
    /// Original human-oriented layout.
    V1,
    /// Comma-separated layout with row headers.
    #[default]
    V2,
    /// Tab-separated variant of version 2.
    V3,
}

impl StatusFormat {
    const fn version(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }
}

impl MgmtClient {
    /// Releases a management hold so the process continues connecting.
    ///
    /// # Errors
    ///
    /// Propagates any [`ClientError`] from the exchange.
    pub fn hold_release(&self) -> Result<(), ClientError> {
        self.command("hold release").map(drop)
    }

    /// Turns real-time `STATE` notifications on or off.
    ///
    /// # Errors
    ///
    /// Propagates any [`ClientError`] from the exchange.
    pub fn set_state_events(&self, enabled: bool) -> Result<(), ClientError> {
        self.command(toggle("state", enabled).as_str()).map(drop)
    }

    /// Turns real-time `ECHO` notifications on or off.
    ///
    /// # Errors
    ///
    /// Propagates any [`ClientError`] from the exchange.
    pub fn set_echo_events(&self, enabled: bool) -> Result<(), ClientError> {
        self.command(toggle("echo", enabled).as_str()).map(drop)
    }

    /// Requests `BYTECOUNT` notifications every `interval`, truncated to
    /// whole seconds. A zero interval turns them off.
    ///
    /// # Errors
    ///
    /// Propagates any [`ClientError`] from the exchange.
    pub fn set_byte_count_events(&self, interval: Duration) -> Result<(), ClientError> {
        self.command(&format!("bytecount {}", interval.as_secs()))
            .map(drop)
    }

    /// Sends a signal to the OpenVPN process.
    ///
    /// # Errors
    ///
    /// Propagates any [`ClientError`] from the exchange.
    pub fn send_signal(&self, signal: Signal) -> Result<(), ClientError> {
        self.command(&format!("signal {signal}")).map(drop)
    }

    /// Retrieves the current connection state.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MalformedReply`] unless the reply carries
    /// exactly one state line, and propagates exchange errors.
    pub fn latest_state(&self) -> Result<StateEvent, ClientError> {
        const COMMAND: &str = "state";
        let lines = self.command_lines(COMMAND)?;
        match lines.as_slice() {
            [line] => Ok(StateEvent::from_body(line)),
            _ => Err(ClientError::malformed(COMMAND, &lines)),
        }
    }

    /// Retrieves the raw status report in the requested layout.
    ///
    /// # Errors
    ///
    /// Propagates any [`ClientError`] from the exchange.
    pub fn latest_status(&self, format: StatusFormat) -> Result<Vec<String>, ClientError> {
        self.command_lines(&format!("status {}", format.version()))
    }

    /// Retrieves the process ID of the OpenVPN process.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MalformedReply`] unless the reply reads
    /// `SUCCESS: pid=<n>`, and propagates exchange errors.
    pub fn pid(&self) -> Result<u32, ClientError> {
        const COMMAND: &str = "pid";
        let reply = self.command(COMMAND)?;
        reply
            .strip_prefix(PID_PREFIX)
            .and_then(|pid| pid.trim().parse().ok())
            .ok_or_else(|| ClientError::malformed(COMMAND, &[reply.clone()]))
    }
}

fn toggle(command: &str, enabled: bool) -> String {
    format!("{command} {}", if enabled { "on" } else { "off" })
}
