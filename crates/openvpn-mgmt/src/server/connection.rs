//! Connections accepted from OpenVPN processes.

use tracing::debug;

use super::LISTENER_TARGET;
use crate::client::{ClientError, ConnectionStream, EventSink, MgmtClient};

/// A connection from an OpenVPN process running with `--management-client`.
///
/// Consumed by exactly one of [`open`](Self::open) or
/// [`close`](Self::close).
#[derive(Debug)]
pub struct IncomingConn {
    stream: ConnectionStream,
    peer: String,
}

impl IncomingConn {
    /// Wraps an accepted stream.
    #[must_use]
    pub fn new(stream: ConnectionStream) -> Self {
        let peer = stream.peer_description();
        Self { stream, peer }
    }

    /// Describes the remote end for log output.
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Starts a management session over the connection, delivering
    /// notifications to `sink`.
    ///
    /// Once the connection is established the roles are indistinguishable
    /// from dialling an OpenVPN management server, so the result is an
    /// ordinary [`MgmtClient`].
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`MgmtClient::new`].
    pub fn open<S: EventSink>(self, sink: S) -> Result<MgmtClient, ClientError> {
        debug!(target: LISTENER_TARGET, peer = %self.peer, "opening management session");
        MgmtClient::new(self.stream, sink)
    }

    /// Abruptly closes the connection without speaking the protocol.
    ///
    /// Meant for rejecting unwanted peers; an open session is better ended
    /// through [`MgmtClient::close`].
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while shutting the connection down.
    pub fn close(self) -> Result<(), ClientError> {
        debug!(target: LISTENER_TARGET, peer = %self.peer, "rejecting management connection");
        self.stream.shutdown().map_err(ClientError::Io)
    }
}
