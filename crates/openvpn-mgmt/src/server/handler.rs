//! Connection handling abstractions for the management listener.

use super::IncomingConn;

/// Handles connections accepted by a [`MgmtListener`](super::MgmtListener).
///
/// Each connection runs on its own thread, so a handler may block for the
/// lifetime of the session. Implementations should avoid panicking.
pub trait IncomingConnHandler: Send + Sync + 'static {
    /// Serves a single connection until the session ends.
    fn serve_mgmt(&self, conn: IncomingConn);
}

/// Plain functions and closures are handlers.
impl<F> IncomingConnHandler for F
where
    F: Fn(IncomingConn) + Send + Sync + 'static,
{
    fn serve_mgmt(&self, conn: IncomingConn) {
        self(conn);
    }
}
