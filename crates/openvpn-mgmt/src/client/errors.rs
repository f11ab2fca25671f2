//! Error types for management client operations.

use std::io;

use thiserror::Error;

/// Errors surfaced while running a management session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Reading from or writing to the connection failed.
    #[error("management connection I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The client was closed locally before or during the operation.
    #[error("management client is closed")]
    Closed,
    /// The connection ended while a reply was outstanding.
    #[error("management connection closed while awaiting a reply")]
    ConnectionClosed,
    /// A command contained a line break and would desynchronise the session.
    #[error("command {command:?} contains a line break")]
    InvalidCommand {
        /// The rejected command text.
        command: String,
    },
    /// OpenVPN answered with an `ERROR:` line.
    #[error("OpenVPN rejected the command: {message}")]
    Server {
        /// Text following the `ERROR:` prefix.
        message: String,
    },
    /// The reply did not have the shape the command expects.
    #[error("malformed reply to {command:?}: {reply:?}")]
    MalformedReply {
        /// The command that was sent.
        command: String,
        /// The reply lines, joined with newlines.
        reply: String,
    },
    /// A session worker thread could not be started.
    #[error("failed to spawn management {role} thread: {source}")]
    Spawn {
        /// Which worker failed to start.
        role: &'static str,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The management address could not be resolved or dialled.
    #[error("failed to connect to management interface at {address}: {source}")]
    Connect {
        /// The address being dialled.
        address: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Unix socket addresses were requested on a platform without them.
    #[cfg(not(unix))]
    #[error("unix sockets are unsupported for address {address}")]
    UnsupportedUnix {
        /// The requested address.
        address: String,
    },
}

impl ClientError {
    pub(crate) fn malformed(command: &str, lines: &[String]) -> Self {
        Self::MalformedReply {
            command: command.to_owned(),
            reply: lines.join("\n"),
        }
    }
}
