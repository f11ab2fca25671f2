//! Supervision of one OpenVPN process over an accepted connection.

use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use openvpn_mgmt::client::{ClientError, MgmtClient};
use openvpn_mgmt::events::Event;
use openvpn_mgmt::server::{IncomingConn, IncomingConnHandler};
use openvpn_mgmt_config::Config;

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Per-session behaviour taken from the daemon configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Interval requested for `BYTECOUNT` notifications; zero disables them.
    pub bytecount_interval: Duration,
    /// Release the management hold whenever OpenVPN announces one.
    pub release_hold: bool,
}

impl SessionSettings {
    /// Extracts the session settings from the configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            bytecount_interval: config.bytecount_interval(),
            release_hold: config.release_hold,
        }
    }
}

/// Handles each OpenVPN connection: subscribes to its notifications, reports
/// its pid and state, logs every event, releases holds when configured, and
/// hangs up after a `FATAL` notification.
#[derive(Debug, Clone)]
pub struct SessionHandler {
    settings: SessionSettings,
}

impl SessionHandler {
    /// Builds a handler applying `settings` to every session.
    #[must_use]
    pub const fn new(settings: SessionSettings) -> Self {
        Self { settings }
    }
}

impl IncomingConnHandler for SessionHandler {
    fn serve_mgmt(&self, conn: IncomingConn) {
        let peer = conn.peer().to_owned();
        let (events, received) = mpsc::channel();
        let client = match conn.open(events) {
            Ok(client) => client,
            Err(error) => {
                warn!(target: SESSION_TARGET, peer = %peer, error = %error, "failed to open session");
                return;
            }
        };
        info!(target: SESSION_TARGET, peer = %peer, "openvpn connected");

        match supervise(&client, &received, self.settings) {
            Ok(()) => info!(target: SESSION_TARGET, peer = %peer, "session ended"),
            Err(error) => warn!(target: SESSION_TARGET, peer = %peer, error = %error, "session failed"),
        }
        if let Err(error) = client.close() {
            debug!(target: SESSION_TARGET, peer = %peer, error = %error, "failed to close session");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    HangUp,
}

fn supervise(
    client: &MgmtClient,
    events: &Receiver<Event>,
    settings: SessionSettings,
) -> Result<(), ClientError> {
    client.set_state_events(true)?;
    client.set_echo_events(true)?;
    client.set_byte_count_events(settings.bytecount_interval)?;

    let pid = client.pid()?;
    let state = client.latest_state()?;
    info!(target: SESSION_TARGET, pid, state = %state, "openvpn status");

    for event in events {
        if handle_event(client, &event, settings)? == Flow::HangUp {
            break;
        }
    }
    Ok(())
}

fn handle_event(
    client: &MgmtClient,
    event: &Event,
    settings: SessionSettings,
) -> Result<Flow, ClientError> {
    match event {
        Event::Hold(hold) => {
            info!(target: SESSION_TARGET, hold = %hold, "openvpn is holding");
            if settings.release_hold {
                client.hold_release()?;
                info!(target: SESSION_TARGET, "hold released");
            }
            Ok(Flow::Continue)
        }
        Event::Fatal(fatal) => {
            error!(target: SESSION_TARGET, event = %fatal, "openvpn reported a fatal error");
            Ok(Flow::HangUp)
        }
        Event::ByteCount(count) => {
            debug!(
                target: SESSION_TARGET,
                client_id = count.client_id(),
                bytes_in = count.bytes_in(),
                bytes_out = count.bytes_out(),
                "byte count"
            );
            Ok(Flow::Continue)
        }
        Event::Malformed(_) => {
            warn!(target: SESSION_TARGET, event = %event, "malformed notification");
            Ok(Flow::Continue)
        }
        other => {
            info!(
                target: SESSION_TARGET,
                keyword = other.keyword(),
                event = %other,
                "notification"
            );
            Ok(Flow::Continue)
        }
    }
}
