//! Listener side of the management protocol.
//!
//! OpenVPN can be told to dial out to its manager instead of accepting
//! management connections itself (`--management-client`). A
//! [`MgmtListener`] accepts those connections and yields an
//! [`IncomingConn`] per OpenVPN process; opening one produces the same
//! [`MgmtClient`](crate::client::MgmtClient) used when dialling.
//!
//! [`listen_and_serve`] wraps the common case: bind, then hand every
//! connection to an [`IncomingConnHandler`] on its own thread until the
//! listener fails permanently.

mod backoff;
mod connection;
mod errors;
mod handler;
mod listener;

pub use backoff::AcceptBackoff;
pub use connection::IncomingConn;
pub use errors::ListenerError;
pub use handler::IncomingConnHandler;
pub use listener::MgmtListener;

use std::convert::Infallible;
use std::sync::Arc;


pub(crate) const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Binds `address` and serves incoming connections with `handler` until the
/// listener fails.
///
/// Each connection is handed to [`IncomingConnHandler::serve_mgmt`] on a
/// dedicated thread. Temporary accept errors are retried with an
/// [`AcceptBackoff`].
///
/// # Errors
///
/// Returns the binding error, or the permanent error that stopped the
/// accept loop.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::sync::mpsc;
///
/// use openvpn_mgmt::server::{IncomingConn, listen_and_serve};
///
/// let handler = Arc::new(|conn: IncomingConn| {
///     let (events, _received) = mpsc::channel::<openvpn_mgmt::Event>();
///     if let Ok(client) = conn.open(events) {
///         let _ = client.hold_release();
///     }
/// });
/// let error = listen_and_serve("127.0.0.1:7505", handler).unwrap_err();
/// eprintln!("listener stopped: {error}");
/// ```
pub fn listen_and_serve(
    address: &str,
    handler: Arc<dyn IncomingConnHandler>,
) -> Result<Infallible, ListenerError> {
    MgmtListener::listen(address)?.serve(handler)
}
