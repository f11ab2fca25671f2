//! Client and listener for the OpenVPN management interface.
//!
//! OpenVPN exposes a line-oriented management protocol over TCP or a Unix
//! socket. Commands are answered with `SUCCESS:`/`ERROR:` lines or with a
//! block of payload lines terminated by `END`, while real-time notifications
//! prefixed with `>` may arrive at any time in between.
//!
//! - [`client::MgmtClient`] drives one session: it sends commands, pairs the
//!   replies with the commands that caused them, and delivers notifications
//!   as typed [`events::Event`]s to an [`client::EventSink`].
//! - [`server::MgmtListener`] accepts connections from OpenVPN processes run
//!   with `--management-client`, so one manager can supervise many tunnels.
//! - [`events`] turns raw notification payloads into typed events.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::mpsc;
//!
//! use openvpn_mgmt::client::MgmtClient;
//!
//! # fn main() -> Result<(), openvpn_mgmt::client::ClientError> {
//! let (events, received) = mpsc::channel::<openvpn_mgmt::Event>();
//! let client = MgmtClient::dial("127.0.0.1:7505", events)?;
//! client.set_state_events(true)?;
//! println!("openvpn pid {}", client.pid()?);
//! for event in received {
//!     println!("{event}");
//! }
//! # Ok(())
//! # }
//! ```

mod address;
pub mod client;
pub mod events;
pub mod server;

pub use address::MgmtAddress;
pub use client::{ClientError, EventSink, MgmtClient};
pub use events::Event;
pub use server::{IncomingConn, IncomingConnHandler, ListenerError, MgmtListener, listen_and_serve};

#[cfg(test)]
mod tests;
