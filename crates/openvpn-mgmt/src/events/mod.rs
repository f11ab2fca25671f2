//! Typed notifications pushed by the OpenVPN management interface.
//!
//! Every line the management interface prefixes with `>` is a real-time
//! notification of the form `KEYWORD:body`. [`upgrade`] classifies the
//! payload (marker already stripped) by keyword and returns the matching
//! [`Event`] variant. Parsing never fails: lines without a keyword separator
//! become [`MalformedEvent`] and keywords this crate does not model become
//! [`UnknownEvent`], so a misbehaving or newer peer cannot break the event
//! stream.
//!
//! Bodies are split into their comma-separated fields eagerly, when the event
//! is constructed. Events are therefore immutable plain data and can be sent
//! across threads freely.

mod byte_count;
mod simple;
mod state;

pub use byte_count::ByteCountEvent;
pub use simple::{EchoEvent, FatalEvent, HoldEvent, MalformedEvent, PasswordEvent, UnknownEvent};
pub use state::StateEvent;

use std::fmt;

#[cfg(test)]
mod tests;

/// Separates a notification keyword from its body.
const KEYWORD_SEPARATOR: u8 = b':';

/// Separates the fields within a notification body.
pub(crate) const FIELD_SEPARATOR: char = ',';

const BYTE_COUNT_KEYWORD: &str = "BYTECOUNT";
const BYTE_COUNT_CLIENT_KEYWORD: &str = "BYTECOUNT_CLI";
const ECHO_KEYWORD: &str = "ECHO";
const FATAL_KEYWORD: &str = "FATAL";
const HOLD_KEYWORD: &str = "HOLD";
const PASSWORD_KEYWORD: &str = "PASSWORD";
const STATE_KEYWORD: &str = "STATE";

/// A real-time notification received from the OpenVPN process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Connection state change (`>STATE:`).
    State(StateEvent),
    /// Management hold awaiting release (`>HOLD:`).
    Hold(HoldEvent),
    /// Free-form message pushed by the server (`>ECHO:`).
    Echo(EchoEvent),
    /// Periodic transfer counters (`>BYTECOUNT:` and `>BYTECOUNT_CLI:`).
    ByteCount(ByteCountEvent),
    /// Request for credentials (`>PASSWORD:`).
    Password(PasswordEvent),
    /// Last message before the process exits (`>FATAL:`).
    Fatal(FatalEvent),
    /// A syntactically valid notification with an unrecognised keyword.
    Unknown(UnknownEvent),
    /// A notification line lacking the keyword separator.
    Malformed(MalformedEvent),
}

impl Event {
    /// Parses one notification payload. See [`upgrade`].
    #[must_use]
    pub fn upgrade(raw: &[u8]) -> Self {
        upgrade(raw)
    }

    /// Returns the notification keyword, or `None` for malformed lines.
    #[must_use]
    pub fn keyword(&self) -> Option<&str> {
        match self {
            Self::State(_) => Some(STATE_KEYWORD),
            Self::Hold(_) => Some(HOLD_KEYWORD),
            Self::Echo(_) => Some(ECHO_KEYWORD),
            Self::ByteCount(event) if event.client_id().is_some() => {
                Some(BYTE_COUNT_CLIENT_KEYWORD)
            }
            Self::ByteCount(_) => Some(BYTE_COUNT_KEYWORD),
            Self::Password(_) => Some(PASSWORD_KEYWORD),
            Self::Fatal(_) => Some(FATAL_KEYWORD),
            Self::Unknown(event) => Some(event.keyword()),
            Self::Malformed(_) => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(event) => event.fmt(formatter),
            Self::Hold(event) => event.fmt(formatter),
            Self::Echo(event) => event.fmt(formatter),
            Self::ByteCount(event) => event.fmt(formatter),
            Self::Password(event) => event.fmt(formatter),
            Self::Fatal(event) => event.fmt(formatter),
            Self::Unknown(event) => event.fmt(formatter),
            Self::Malformed(event) => event.fmt(formatter),
        }
    }
}

/// Classifies one notification payload, already stripped of its leading `>`.
///
/// The payload is split at the first `:` into keyword and body and dispatched
/// on an exact keyword match. This function never fails and never panics.
/// Text is decoded as UTF-8 with invalid sequences replaced; only
/// [`MalformedEvent::raw`] and the raw accessors of [`UnknownEvent`] keep the
/// exact bytes.
///
/// # Examples
///
/// ```
/// use openvpn_mgmt::events::{Event, upgrade};
///
/// let event = upgrade(b"BYTECOUNT:100,200");
/// let Event::ByteCount(counts) = event else {
///     panic!("expected a byte count");
/// };
/// assert_eq!(counts.bytes_in(), 100);
/// assert_eq!(counts.bytes_out(), 200);
/// ```
#[must_use]
pub fn upgrade(raw: &[u8]) -> Event {
    let Some(split_at) = raw.iter().position(|byte| *byte == KEYWORD_SEPARATOR) else {
        return Event::Malformed(MalformedEvent::new(raw));
    };
    let (raw_keyword, rest) = raw.split_at(split_at);
    let raw_body = rest.get(1..).unwrap_or_default();
    let body = String::from_utf8_lossy(raw_body);
    let keyword = String::from_utf8_lossy(raw_keyword);

    match keyword.as_ref() {
        STATE_KEYWORD => Event::State(StateEvent::from_body(&body)),
        HOLD_KEYWORD => Event::Hold(HoldEvent::new(body.into_owned())),
        ECHO_KEYWORD => Event::Echo(EchoEvent::from_body(&body)),
        BYTE_COUNT_KEYWORD => Event::ByteCount(ByteCountEvent::from_body(&body)),
        BYTE_COUNT_CLIENT_KEYWORD => Event::ByteCount(ByteCountEvent::from_client_body(&body)),
        PASSWORD_KEYWORD => Event::Password(PasswordEvent::new(body.into_owned())),
        FATAL_KEYWORD => Event::Fatal(FatalEvent::new(body.into_owned())),
        _ => Event::Unknown(UnknownEvent::new(raw_keyword, raw_body)),
    }
}

/// Splits `body` into at most `limit` fields, padding with empty strings so
/// at least `minimum` fields are always present.
pub(crate) fn split_fields(body: &str, limit: usize, minimum: usize) -> Vec<String> {
    let mut fields: Vec<String> = body
        .splitn(limit, FIELD_SEPARATOR)
        .map(str::to_owned)
        .collect();
    if fields.len() < minimum {
        fields.resize(minimum, String::new());
    }
    fields
}

/// Returns the field at `index`, or an empty string when it is absent.
pub(crate) fn field(fields: &[String], index: usize) -> String {
    fields.get(index).cloned().unwrap_or_default()
}
