//! `>BYTECOUNT:` and `>BYTECOUNT_CLI:` notifications.

use std::fmt;

use super::{field, split_fields};

const BYTE_COUNT_FIELD_LIMIT: usize = 4;

/// Periodic snapshot of data transferred on a VPN connection.
///
/// OpenVPN servers emit one event per connected client, identified by
/// [`client_id`](Self::client_id). In other modes a single event is emitted
/// per interval and the client identifier is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteCountEvent {
    client_id: Option<String>,
    bytes_in: u64,
    bytes_out: u64,
}

impl ByteCountEvent {
    /// Parses a `<in>,<out>` body.
    #[must_use]
    pub fn from_body(body: &str) -> Self {
        let fields = split_fields(body, BYTE_COUNT_FIELD_LIMIT, 2);
        Self {
            client_id: None,
            bytes_in: parse_counter(&field(&fields, 0)),
            bytes_out: parse_counter(&field(&fields, 1)),
        }
    }

    /// Parses a `<client-id>,<in>,<out>` body.
    #[must_use]
    pub fn from_client_body(body: &str) -> Self {
        let fields = split_fields(body, BYTE_COUNT_FIELD_LIMIT, 3);
        Self {
            client_id: Some(field(&fields, 0)),
            bytes_in: parse_counter(&field(&fields, 1)),
            bytes_out: parse_counter(&field(&fields, 2)),
        }
    }

    /// Client identifier, present only for the per-client variant.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Bytes received since the connection started.
    #[must_use]
    pub const fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Bytes sent since the connection started.
    #[must_use]
    pub const fn bytes_out(&self) -> u64 {
        self.bytes_out
    }
}

/// Counters that fail to parse read as zero; a well-behaved peer never sends
/// them.
fn parse_counter(text: &str) -> u64 {
    text.trim().parse().unwrap_or(0)
}

impl fmt::Display for ByteCountEvent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.client_id {
            Some(client_id) => write!(
                formatter,
                "Client {client_id}: {} in, {} out",
                self.bytes_in, self.bytes_out
            ),
            None => write!(formatter, "{} in, {} out", self.bytes_in, self.bytes_out),
        }
    }
}
