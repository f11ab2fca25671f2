//! Protocol engine for one management session.
//!
//! A [`MgmtClient`] owns one connection to an OpenVPN management interface.
//! A background reader splits the inbound stream into notifications, which
//! are parsed into [`Event`](crate::events::Event)s and delivered to the
//! caller's [`EventSink`], and command replies, which are handed back to the
//! callers that issued the commands. Replies are paired with commands
//! strictly in send order.
//!
//! Notifications are never dropped. They are queued internally without bound
//! and delivered with a blocking [`EventSink::deliver`], so a full sink
//! applies backpressure to notification delivery only; command replies keep
//! flowing regardless.

mod commands;
mod errors;
mod reader;
mod reply;
mod sink;
mod stream;

pub use commands::{Signal, StatusFormat};
pub use errors::ClientError;
pub use reply::ReplyKind;
pub use sink::{EventSink, SinkClosed};
pub use stream::ConnectionStream;

use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::MgmtAddress;

use self::reply::PendingReplies;


pub(crate) const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Client half of a management session.
///
/// Commands may be issued concurrently from several threads; writes are
/// serialised and every command waits for its own reply.
#[derive(Debug)]
pub struct MgmtClient {
    writer: Mutex<ConnectionStream>,
    control: ConnectionStream,
    pending: Arc<PendingReplies>,
    closed: AtomicBool,
}

impl MgmtClient {
    /// Starts a session over an established connection.
    ///
    /// Notifications are delivered to `sink` in the order they arrive. The
    /// sink is dropped once the connection ends.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] when the stream cannot be duplicated for
    /// the reader, or [`ClientError::Spawn`] when a worker thread cannot be
    /// started.
    pub fn new<S: EventSink>(
        stream: impl Into<ConnectionStream>,
        sink: S,
    ) -> Result<Self, ClientError> {
        let stream = stream.into();
        let read_half = stream.try_clone()?;
        let control = stream.try_clone()?;
        let pending = Arc::new(PendingReplies::default());

        let (notifications, raw_events) = mpsc::channel();
        reader::spawn_dispatcher(raw_events, sink)?;
        reader::spawn_reader(read_half, Arc::clone(&pending), notifications)?;

        debug!(
            target: CLIENT_TARGET,
            peer = %control.peer_description(),
            "management session opened"
        );
        Ok(Self {
            writer: Mutex::new(stream),
            control,
            pending,
            closed: AtomicBool::new(false),
        })
    }

    /// Connects to an OpenVPN process exposing a management server and
    /// starts a session over the connection.
    ///
    /// Addresses beginning with `/` are Unix socket paths; anything else is a
    /// `host:port` pair.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connect`] when the address cannot be resolved
    /// or dialled, plus any error from [`MgmtClient::new`].
    pub fn dial<S: EventSink>(address: &str, sink: S) -> Result<Self, ClientError> {
        let stream = connect(&MgmtAddress::parse(address))?;
        Self::new(stream, sink)
    }

    /// Sends a command answered by a single `SUCCESS:` line and returns the
    /// text after the prefix.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Server`] for an `ERROR:` reply,
    /// [`ClientError::MalformedReply`] for anything else, and transport
    /// errors when the session is closed or broken.
    pub fn command(&self, command: &str) -> Result<String, ClientError> {
        let lines = self.exchange(command, ReplyKind::Single)?;
        reply::parse_single(command, &lines)
    }

    /// Sends a command answered by payload lines terminated by `END` and
    /// returns the payload lines.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Server`] for an `ERROR:` reply and transport
    /// errors when the session is closed or broken.
    pub fn command_lines(&self, command: &str) -> Result<Vec<String>, ClientError> {
        let lines = self.exchange(command, ReplyKind::Multi)?;
        reply::parse_multi(lines)
    }

    /// Sends a raw command line and waits for its reply lines, without
    /// interpreting them.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidCommand`] when `command` spans several
    /// lines, [`ClientError::Closed`] after [`close`](Self::close), and
    /// [`ClientError::ConnectionClosed`] when the connection ends before the
    /// reply is complete.
    pub fn exchange(&self, command: &str, kind: ReplyKind) -> Result<Vec<String>, ClientError> {
        if command.contains(['\n', '\r']) {
            return Err(ClientError::InvalidCommand {
                command: command.to_owned(),
            });
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }

        let receiver = {
            let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            // Registering under the write lock keeps reply slots in send order.
            let receiver = self.pending.register(kind)?;
            debug!(target: CLIENT_TARGET, command, "sending command");
            if let Err(error) = write_line(&mut writer, command) {
                warn!(
                    target: CLIENT_TARGET,
                    error = %error,
                    "failed to write command; closing session"
                );
                self.shutdown_connection();
                return Err(ClientError::Io(error));
            }
            receiver
        };

        receiver
            .recv()
            .unwrap_or(Err(ClientError::ConnectionClosed))
    }

    /// Closes the connection.
    ///
    /// The first call shuts the connection down; later calls do nothing.
    /// Callers blocked awaiting replies fail with
    /// [`ClientError::ConnectionClosed`] and later commands fail with
    /// [`ClientError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while shutting the connection down.
    pub fn close(&self) -> Result<(), ClientError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(target: CLIENT_TARGET, "closing management session");
        self.control.shutdown().map_err(ClientError::Io)
    }

    /// Reports whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn shutdown_connection(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Err(error) = self.control.shutdown() {
            debug!(
                target: CLIENT_TARGET,
                error = %error,
                "failed to shut down management connection"
            );
        }
    }
}

impl Drop for MgmtClient {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.control.shutdown();
        }
    }
}

fn write_line(writer: &mut ConnectionStream, command: &str) -> std::io::Result<()> {
    writer.write_all(command.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

fn connect(address: &MgmtAddress) -> Result<ConnectionStream, ClientError> {
    let connect_error = |source: std::io::Error| ClientError::Connect {
        address: address.to_string(),
        source,
    };
    match address {
        MgmtAddress::Tcp { address: host_port } => {
            let addrs: Vec<SocketAddr> = host_port
                .to_socket_addrs()
                .map_err(connect_error)?
                .collect();
            TcpStream::connect(addrs.as_slice())
                .map(ConnectionStream::Tcp)
                .map_err(connect_error)
        }
        MgmtAddress::Unix { path } => {
            #[cfg(unix)]
            {
                std::os::unix::net::UnixStream::connect(path.as_std_path())
                    .map(ConnectionStream::Unix)
                    .map_err(connect_error)
            }

            #[cfg(not(unix))]
            {
                let _ = path;
                Err(ClientError::UnsupportedUnix {
                    address: address.to_string(),
                })
            }
        }
    }
}
