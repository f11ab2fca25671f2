//! Notifications whose bodies are opaque or nearly so.

use std::fmt;

use super::FIELD_SEPARATOR;

/// The process is in a management hold and will not continue until the hold
/// is released, e.g. with [`MgmtClient::hold_release`].
///
/// [`MgmtClient::hold_release`]: crate::client::MgmtClient::hold_release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldEvent {
    body: String,
}

impl HoldEvent {
    pub(crate) const fn new(body: String) -> Self {
        Self { body }
    }

    /// The hold message.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for HoldEvent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.body)
    }
}

/// Free-form message pushed by a server to a client-mode process.
///
/// Emitted only after echo notifications are enabled with
/// [`MgmtClient::set_echo_events`].
///
/// [`MgmtClient::set_echo_events`]: crate::client::MgmtClient::set_echo_events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoEvent {
    body: String,
    raw_timestamp: String,
    message: String,
}

impl EchoEvent {
    pub(crate) fn from_body(body: &str) -> Self {
        let (raw_timestamp, message) = body
            .split_once(FIELD_SEPARATOR)
            .unwrap_or_default();
        Self {
            raw_timestamp: raw_timestamp.to_owned(),
            message: message.to_owned(),
            body: body.to_owned(),
        }
    }

    /// Unix timestamp of the message, as sent by the peer.
    #[must_use]
    pub fn raw_timestamp(&self) -> &str {
        &self.raw_timestamp
    }

    /// Message text; may itself contain commas.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The unparsed notification body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for EchoEvent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "ECHO: {}", self.message)
    }
}

/// Request for authentication data such as a username and password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordEvent {
    body: String,
}

impl PasswordEvent {
    pub(crate) const fn new(body: String) -> Self {
        Self { body }
    }

    /// The credential request text.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for PasswordEvent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "PASSWORD: {}", self.body)
    }
}

/// Final message sent before the process exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalEvent {
    body: String,
}

impl FatalEvent {
    pub(crate) const fn new(body: String) -> Self {
        Self { body }
    }

    /// The fatal error text.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for FatalEvent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "FATAL: {}", self.body)
    }
}

/// A notification whose keyword this crate does not model.
///
/// Later releases may learn about new keywords, so behaviour built on this
/// variant is not covered by any compatibility promise.
///
/// [`keyword`](Self::keyword) and [`body`](Self::body) are decoded as UTF-8,
/// with invalid sequences replaced by U+FFFD. The received bytes are kept in
/// [`raw_keyword`](Self::raw_keyword) and [`raw_body`](Self::raw_body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEvent {
    keyword: String,
    body: String,
    raw_keyword: Vec<u8>,
    raw_body: Vec<u8>,
}

impl UnknownEvent {
    pub(crate) fn new(raw_keyword: &[u8], raw_body: &[u8]) -> Self {
        Self {
            keyword: String::from_utf8_lossy(raw_keyword).into_owned(),
            body: String::from_utf8_lossy(raw_body).into_owned(),
            raw_keyword: raw_keyword.to_vec(),
            raw_body: raw_body.to_vec(),
        }
    }

    /// The notification keyword as text.
    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// The notification body as text.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The notification keyword, byte for byte.
    #[must_use]
    pub fn raw_keyword(&self) -> &[u8] {
        &self.raw_keyword
    }

    /// The notification body, byte for byte.
    #[must_use]
    pub fn raw_body(&self) -> &[u8] {
        &self.raw_body
    }
}

impl fmt::Display for UnknownEvent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.keyword, self.body)
    }
}

/// A line presented as a notification that lacks the `KEYWORD:` prefix.
///
/// A well-behaved OpenVPN process never sends these. Seeing one usually means
/// the peer is not an OpenVPN process at all. Lines the client had to
/// truncate for length are reported this way too.
///
/// The `Display` rendering decodes the payload lossily; [`raw`](Self::raw)
/// has the exact bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEvent {
    raw: Vec<u8>,
}

impl MalformedEvent {
    pub(crate) fn new(raw: &[u8]) -> Self {
        Self { raw: raw.to_vec() }
    }

    /// The offending payload, byte for byte.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

impl fmt::Display for MalformedEvent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "Malformed Event \"{}\"",
            String::from_utf8_lossy(&self.raw)
        )
    }
}
