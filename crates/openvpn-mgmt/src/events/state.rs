//! `>STATE:` notifications.

use std::fmt;

use super::{field, split_fields};

const STATE_FIELD_LIMIT: usize = 9;
const STATE_FIELD_MINIMUM: usize = 8;
const EXTENDED_LOCAL_ADDR_INDEX: usize = 8;
const LEGACY_LOCAL_ADDR_INDEX: usize = 3;

const ASSIGN_IP_STATE: &str = "ASSIGN_IP";
const CONNECTED_STATE: &str = "CONNECTED";

/// A change of connection state.
///
/// Useful, for example, to detect that the tunnel was interrupted and the
/// OpenVPN process is attempting to reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEvent {
    body: String,
    raw_timestamp: String,
    new_state: String,
    description: String,
    local_tunnel_addr: String,
    remote_addr: String,
}

impl StateEvent {
    /// Parses the body of a state notification, or one line of the `state`
    /// command reply, which shares the same layout.
    #[must_use]
    pub fn from_body(body: &str) -> Self {
        let fields = split_fields(body, STATE_FIELD_LIMIT, STATE_FIELD_MINIMUM);
        // Newer peers append the local address again at index 8; the legacy
        // five-field form carries it at index 3.
        let local_index = if fields.len() > EXTENDED_LOCAL_ADDR_INDEX {
            EXTENDED_LOCAL_ADDR_INDEX
        } else {
            LEGACY_LOCAL_ADDR_INDEX
        };
        Self {
            raw_timestamp: field(&fields, 0),
            new_state: field(&fields, 1),
            description: field(&fields, 2),
            local_tunnel_addr: field(&fields, local_index),
            remote_addr: field(&fields, 4),
            body: body.to_owned(),
        }
    }

    /// Unix timestamp of the change, as sent by the peer.
    #[must_use]
    pub fn raw_timestamp(&self) -> &str {
        &self.raw_timestamp
    }

    /// State keyword, such as `CONNECTING` or `CONNECTED`.
    #[must_use]
    pub fn new_state(&self) -> &str {
        &self.new_state
    }

    /// Free-text description accompanying the state.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Address of the local interface inside the tunnel.
    ///
    /// Only populated when [`new_state`](Self::new_state) is `ASSIGN_IP` or
    /// `CONNECTED`.
    #[must_use]
    pub fn local_tunnel_addr(&self) -> &str {
        &self.local_tunnel_addr
    }

    /// Non-tunnel address of the remote endpoint.
    ///
    /// Only populated when [`new_state`](Self::new_state) is `CONNECTED`.
    #[must_use]
    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// The unparsed notification body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for StateEvent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.new_state.as_str() {
            ASSIGN_IP_STATE => write!(formatter, "{}: {}", self.new_state, self.local_tunnel_addr),
            CONNECTED_STATE => write!(formatter, "{}: {}", self.new_state, self.remote_addr),
            _ if self.description.is_empty() => formatter.write_str(&self.new_state),
            _ => write!(formatter, "{}: {}", self.new_state, self.description),
        }
    }
}
