//! Listener implementation for management sockets.

use std::convert::Infallible;
use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{AcceptBackoff, IncomingConn, IncomingConnHandler, LISTENER_TARGET, ListenerError};
use crate::MgmtAddress;
use crate::client::ConnectionStream;

#[cfg(unix)]
use camino::Utf8PathBuf;
#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};

/// How often a blocked [`MgmtListener::accept`] polls the socket and notices
/// that the listener was closed.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Accepts incoming connections from OpenVPN processes.
///
/// OpenVPN dials a listener when launched with
/// `--management <ip> <port> --management-client`, or
/// `--management /path/to/socket unix --management-client` for a Unix
/// socket. TCP/IP roles are then reversed, but once connected the session is
/// the same as when dialling an OpenVPN management server.
///
/// Clones share the same socket; closing any clone closes them all.
#[derive(Debug, Clone)]
pub struct MgmtListener {
    inner: Arc<ListenerInner>,
}

#[derive(Debug)]
struct ListenerInner {
    address: MgmtAddress,
    local_addr: Option<SocketAddr>,
    socket: Mutex<Option<ListenerKind>>,
    #[cfg(unix)]
    owned_socket_file: Option<Utf8PathBuf>,
}

#[derive(Debug)]
enum ListenerKind {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl ListenerKind {
    fn set_nonblocking(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener) => listener.set_nonblocking(true),
        }
    }
}

impl MgmtListener {
    /// Opens a listening socket for OpenVPN to connect to.
    ///
    /// An address beginning with `/` is a Unix socket path; anything else is
    /// a TCP `host:port`. A host name resolving to several addresses binds
    /// the first one that is free, so `localhost` may end up on `::1` only.
    ///
    /// # Errors
    ///
    /// Returns a [`ListenerError`] when the address cannot be resolved or
    /// bound.
    pub fn listen(address: &str) -> Result<Self, ListenerError> {
        Self::bind(&MgmtAddress::parse(address))
    }

    /// Binds a listener to a parsed address.
    ///
    /// A Unix socket file left behind by a dead process is replaced; one that
    /// still answers is reported as [`ListenerError::UnixInUse`]. The socket
    /// file is removed again when the listener closes.
    ///
    /// # Errors
    ///
    /// Returns a [`ListenerError`] when the address cannot be resolved or
    /// bound.
    pub fn bind(address: &MgmtAddress) -> Result<Self, ListenerError> {
        match address {
            MgmtAddress::Tcp { address: host_port } => {
                let listener = bind_tcp(host_port)?;
                Self::from_kind(address.clone(), ListenerKind::Tcp(listener), None)
            }
            MgmtAddress::Unix { path } => {
                #[cfg(unix)]
                {
                    let listener = bind_unix(path)?;
                    Self::from_kind(
                        address.clone(),
                        ListenerKind::Unix(listener),
                        Some(path.clone()),
                    )
                }

                #[cfg(not(unix))]
                {
                    let _ = path;
                    Err(ListenerError::UnsupportedUnix {
                        address: address.to_string(),
                    })
                }
            }
        }
    }

    /// Wraps an already bound TCP listener.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::NonBlocking`] when the socket mode cannot be
    /// changed.
    pub fn from_tcp(listener: TcpListener) -> Result<Self, ListenerError> {
        let address = listener
            .local_addr()
            .map_or_else(|_| "unknown".to_owned(), |addr| addr.to_string());
        Self::from_kind(
            MgmtAddress::Tcp { address },
            ListenerKind::Tcp(listener),
            None,
        )
    }

    /// Wraps an already bound Unix listener. The socket file is left in place
    /// when the listener closes.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::NonBlocking`] when the socket mode cannot be
    /// changed.
    #[cfg(unix)]
    pub fn from_unix(listener: UnixListener) -> Result<Self, ListenerError> {
        let path = listener
            .local_addr()
            .ok()
            .and_then(|addr| addr.as_pathname().map(|path| path.display().to_string()))
            .unwrap_or_default();
        Self::from_kind(
            MgmtAddress::Unix {
                path: Utf8PathBuf::from(path),
            },
            ListenerKind::Unix(listener),
            None,
        )
    }

    fn from_kind(
        address: MgmtAddress,
        kind: ListenerKind,
        owned_socket_file: Option<camino::Utf8PathBuf>,
    ) -> Result<Self, ListenerError> {
        #[cfg(not(unix))]
        drop(owned_socket_file);
        if let Err(source) = kind.set_nonblocking() {
            #[cfg(unix)]
            if let Some(path) = &owned_socket_file {
                remove_socket_file(path);
            }
            return Err(ListenerError::NonBlocking { source });
        }
        let local_addr = match &kind {
            ListenerKind::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            ListenerKind::Unix(_) => None,
        };
        info!(
            target: LISTENER_TARGET,
            address = %address,
            "management listener bound"
        );
        Ok(Self {
            inner: Arc::new(ListenerInner {
                address,
                local_addr,
                socket: Mutex::new(Some(kind)),
                #[cfg(unix)]
                owned_socket_file,
            }),
        })
    }

    /// The address the listener was bound to.
    #[must_use]
    pub fn address(&self) -> &MgmtAddress {
        &self.inner.address
    }

    /// The bound TCP address, useful after binding port 0. `None` for Unix
    /// sockets.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr
    }

    /// Waits for and returns the next connection.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Closed`] once the listener is closed, even
    /// when the close happens while this call is waiting, and
    /// [`ListenerError::Accept`] when accepting fails.
    pub fn accept(&self) -> Result<IncomingConn, ListenerError> {
        loop {
            if let Some(conn) = self.try_accept()? {
                return Ok(conn);
            }
            thread::sleep(ACCEPT_POLL_INTERVAL);
        }
    }

    fn try_accept(&self) -> Result<Option<IncomingConn>, ListenerError> {
        let socket = self
            .inner
            .socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(kind) = socket.as_ref() else {
            return Err(ListenerError::Closed);
        };
        accept_connection(kind)
            .map(|stream| stream.map(IncomingConn::new))
            .map_err(|source| ListenerError::Accept { source })
    }

    /// Closes the listening socket. Blocked and later [`accept`](Self::accept)
    /// calls fail with [`ListenerError::Closed`]. Closing twice is harmless.
    pub fn close(&self) {
        let socket = self
            .inner
            .socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(socket) = socket else {
            return;
        };
        drop(socket);
        #[cfg(unix)]
        if let Some(path) = &self.inner.owned_socket_file {
            remove_socket_file(path);
        }
        info!(
            target: LISTENER_TARGET,
            address = %self.inner.address,
            "management listener closed"
        );
    }

    /// Reports whether the listener has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner
            .socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Accepts connections and hands each to `handler` on its own thread.
    ///
    /// Temporary accept errors are retried after an [`AcceptBackoff`] delay.
    /// Does not return until the listener is closed or fails permanently; the
    /// listener is closed on return and the terminating error is returned.
    ///
    /// # Errors
    ///
    /// Always returns the error that stopped the loop.
    pub fn serve(&self, handler: Arc<dyn IncomingConnHandler>) -> Result<Infallible, ListenerError> {
        self.serve_with_backoff(handler, AcceptBackoff::default())
    }

    /// Like [`serve`](Self::serve) with a custom retry policy.
    ///
    /// # Errors
    ///
    /// Always returns the error that stopped the loop.
    pub fn serve_with_backoff(
        &self,
        handler: Arc<dyn IncomingConnHandler>,
        backoff: AcceptBackoff,
    ) -> Result<Infallible, ListenerError> {
        info!(
            target: LISTENER_TARGET,
            address = %self.inner.address,
            "management listener serving"
        );
        let error = serve_connections(self, &handler, backoff, thread::sleep);
        self.close();
        Err(error)
    }
}

/// Source of accepted connections for [`serve_connections`].
pub(super) trait Acceptor {
    fn accept(&self) -> Result<IncomingConn, ListenerError>;
}

impl Acceptor for MgmtListener {
    fn accept(&self) -> Result<IncomingConn, ListenerError> {
        Self::accept(self)
    }
}

/// Runs the accept loop until a permanent error, which is returned.
pub(super) fn serve_connections<A, S>(
    acceptor: &A,
    handler: &Arc<dyn IncomingConnHandler>,
    mut backoff: AcceptBackoff,
    mut sleep: S,
) -> ListenerError
where
    A: Acceptor + ?Sized,
    S: FnMut(Duration),
{
    loop {
        match acceptor.accept() {
            Ok(conn) => {
                backoff.reset();
                dispatch(handler, conn);
            }
            Err(error) if error.is_temporary() => {
                let delay = backoff.next_delay();
                warn!(
                    target: LISTENER_TARGET,
                    error = %error,
                    delay = ?delay,
                    "temporary accept error; retrying"
                );
                sleep(delay);
            }
            Err(error) => {
                debug!(
                    target: LISTENER_TARGET,
                    error = %error,
                    "management listener stopping"
                );
                return error;
            }
        }
    }
}

fn dispatch(handler: &Arc<dyn IncomingConnHandler>, conn: IncomingConn) {
    let handler = Arc::clone(handler);
    let peer = conn.peer().to_owned();
    debug!(target: LISTENER_TARGET, peer = %peer, "accepted management connection");
    let spawned = thread::Builder::new()
        .name("openvpn-mgmt-conn".to_owned())
        .spawn(move || handler.serve_mgmt(conn));
    if let Err(error) = spawned {
        warn!(
            target: LISTENER_TARGET,
            error = %error,
            peer = %peer,
            "failed to spawn connection handler; dropping connection"
        );
    }
}

fn accept_connection(listener: &ListenerKind) -> io::Result<Option<ConnectionStream>> {
    let accepted = match listener {
        ListenerKind::Tcp(tcp) => tcp.accept().map(|(stream, _)| ConnectionStream::Tcp(stream)),
        #[cfg(unix)]
        ListenerKind::Unix(unix) => unix
            .accept()
            .map(|(stream, _)| ConnectionStream::Unix(stream)),
    };
    match accepted {
        Ok(stream) => {
            stream.set_nonblocking(false)?;
            Ok(Some(stream))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn bind_tcp(address: &str) -> Result<TcpListener, ListenerError> {
    let addrs = address
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            address: address.to_owned(),
            source,
        })?;
    bind_first_available(address, addrs)
}

/// Binds the first of `addrs` that accepts a listener, reporting the last
/// failure when none does.
pub(super) fn bind_first_available(
    address: &str,
    addrs: impl IntoIterator<Item = SocketAddr>,
) -> Result<TcpListener, ListenerError> {
    let mut last_error = None;
    for addr in addrs {
        match TcpListener::bind(addr) {
            Ok(listener) => return Ok(listener),
            Err(source) => {
                debug!(
                    target: LISTENER_TARGET,
                    addr = %addr,
                    error = %source,
                    "failed to bind resolved address"
                );
                last_error = Some(ListenerError::BindTcp { addr, source });
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ListenerError::ResolveEmpty {
        address: address.to_owned(),
    }))
}

#[cfg(unix)]
fn bind_unix(path: &Utf8PathBuf) -> Result<UnixListener, ListenerError> {
    if path.exists() {
        let metadata =
            fs::symlink_metadata(path).map_err(|source| ListenerError::UnixMetadata {
                path: path.to_string(),
                source,
            })?;
        if !metadata.file_type().is_socket() {
            return Err(ListenerError::UnixNotSocket {
                path: path.to_string(),
            });
        }
        match UnixStream::connect(path) {
            Ok(_stream) => {
                return Err(ListenerError::UnixInUse {
                    path: path.to_string(),
                });
            }
            Err(error)
                if error.kind() == io::ErrorKind::ConnectionRefused
                    || error.kind() == io::ErrorKind::NotFound =>
            {
                fs::remove_file(path).map_err(|source| ListenerError::UnixCleanup {
                    path: path.to_string(),
                    source,
                })?;
            }
            Err(error) => {
                return Err(ListenerError::UnixConnect {
                    path: path.to_string(),
                    source: error,
                });
            }
        }
    }

    UnixListener::bind(path).map_err(|source| ListenerError::BindUnix {
        path: path.to_string(),
        source,
    })
}

#[cfg(unix)]
fn remove_socket_file(path: &Utf8PathBuf) {
    if let Err(error) = fs::remove_file(path)
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            error = %error,
            path = %path,
            "failed to remove unix socket file"
        );
    }
}
