//! Error types for management listener operations.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced while binding or running a management listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP address could not be resolved.
    #[error("failed to resolve TCP address {address}: {source}")]
    Resolve {
        /// The `host:port` being resolved.
        address: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The TCP address resolved to nothing.
    #[error("no TCP addresses resolved for {address}")]
    ResolveEmpty {
        /// The `host:port` being resolved.
        address: String,
    },
    /// Binding the TCP socket failed.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        /// The resolved socket address.
        addr: SocketAddr,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The listening socket could not be switched to non-blocking mode.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Unix sockets were requested on a platform without them.
    #[cfg(not(unix))]
    #[error("unix sockets are unsupported for address {address}")]
    UnsupportedUnix {
        /// The requested address.
        address: String,
    },
    /// Binding the Unix socket failed.
    #[cfg(unix)]
    #[error("failed to bind unix listener at {path}: {source}")]
    BindUnix {
        /// The socket path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Another process is already listening on the Unix socket.
    #[cfg(unix)]
    #[error("existing unix socket {path} is already in use")]
    UnixInUse {
        /// The socket path.
        path: String,
    },
    /// The Unix socket path exists but is not a socket.
    #[cfg(unix)]
    #[error("unix socket path {path} is not a socket")]
    UnixNotSocket {
        /// The socket path.
        path: String,
    },
    /// The existing Unix socket path could not be inspected.
    #[cfg(unix)]
    #[error("failed to read metadata for unix socket {path}: {source}")]
    UnixMetadata {
        /// The socket path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Probing the existing Unix socket failed unexpectedly.
    #[cfg(unix)]
    #[error("failed to connect to existing unix socket {path}: {source}")]
    UnixConnect {
        /// The socket path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A stale Unix socket could not be removed.
    #[cfg(unix)]
    #[error("failed to remove stale unix socket {path}: {source}")]
    UnixCleanup {
        /// The socket path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Accepting a connection failed.
    #[error("failed to accept management connection: {source}")]
    Accept {
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The listener has been closed.
    #[error("management listener is closed")]
    Closed,
}

impl ListenerError {
    /// Reports whether the error is transient, so accepting may be retried
    /// after a pause.
    ///
    /// Only accept failures can be temporary: aborted or reset handshakes,
    /// interruptions, timeouts, and descriptor or buffer exhaustion.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        match self {
            Self::Accept { source } => is_temporary_io_error(source),
            _ => false,
        }
    }
}

fn is_temporary_io_error(error: &io::Error) -> bool {
    if matches!(
        error.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
    ) {
        return true;
    }

    #[cfg(unix)]
    if let Some(code) = error.raw_os_error() {
        return matches!(
            code,
            libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM
        );
    }

    false
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::aborted(io::ErrorKind::ConnectionAborted, true)]
    #[case::reset(io::ErrorKind::ConnectionReset, true)]
    #[case::interrupted(io::ErrorKind::Interrupted, true)]
    #[case::timed_out(io::ErrorKind::TimedOut, true)]
    #[case::invalid_input(io::ErrorKind::InvalidInput, false)]
    #[case::permission(io::ErrorKind::PermissionDenied, false)]
    fn classifies_accept_errors_by_kind(#[case] kind: io::ErrorKind, #[case] temporary: bool) {
        let error = ListenerError::Accept {
            source: io::Error::new(kind, "accept"),
        };
        assert_eq!(error.is_temporary(), temporary);
    }

    #[cfg(unix)]
    #[rstest]
    #[case::process_descriptors(libc::EMFILE, true)]
    #[case::system_descriptors(libc::ENFILE, true)]
    #[case::bad_descriptor(libc::EBADF, false)]
    fn classifies_accept_errors_by_errno(#[case] code: i32, #[case] temporary: bool) {
        let error = ListenerError::Accept {
            source: io::Error::from_raw_os_error(code),
        };
        assert_eq!(error.is_temporary(), temporary);
    }

    #[rstest]
    fn closed_is_permanent() {
        assert!(!ListenerError::Closed.is_temporary());
    }
}
