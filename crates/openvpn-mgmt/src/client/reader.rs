//! Background workers that demultiplex the inbound stream.
//!
//! The reader thread splits the stream into lines. Notification lines go onto
//! an unbounded internal queue; everything else completes pending replies.
//! A second thread drains the queue, parses each notification and delivers it
//! to the caller's sink. Keeping the sink off the reader thread means a slow
//! consumer delays events but never command replies.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use tracing::{debug, trace, warn};

use super::reply::PendingReplies;
use super::{CLIENT_TARGET, ClientError, ConnectionStream, EventSink};
use crate::events::{Event, MalformedEvent, upgrade};

const NOTIFICATION_MARKER: u8 = b'>';

/// Longest line kept in full; longer lines are truncated to this many bytes.
pub(super) const MAX_LINE_BYTES: usize = 64 * 1024;

/// A notification payload handed from the reader to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Notification {
    /// A complete payload, marker stripped.
    Line(Vec<u8>),
    /// The first bytes of a payload that exceeded [`MAX_LINE_BYTES`].
    Truncated(Vec<u8>),
}

impl Notification {
    fn into_event(self) -> Event {
        match self {
            Self::Line(raw) => upgrade(&raw),
            Self::Truncated(raw) => Event::Malformed(MalformedEvent::new(&raw)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineRead {
    Complete,
    Truncated,
    EndOfStream,
}

pub(super) fn spawn_reader(
    stream: ConnectionStream,
    pending: Arc<PendingReplies>,
    notifications: Sender<Notification>,
) -> Result<(), ClientError> {
    thread::Builder::new()
        .name("openvpn-mgmt-reader".to_owned())
        .spawn(move || {
            read_loop(
                BufReader::new(stream),
                MAX_LINE_BYTES,
                &pending,
                &notifications,
            );
        })
        .map(drop)
        .map_err(|source| ClientError::Spawn {
            role: "reader",
            source,
        })
}

pub(super) fn spawn_dispatcher<S: EventSink>(
    notifications: Receiver<Notification>,
    sink: S,
) -> Result<(), ClientError> {
    thread::Builder::new()
        .name("openvpn-mgmt-events".to_owned())
        .spawn(move || dispatch_events(&notifications, &sink))
        .map(drop)
        .map_err(|source| ClientError::Spawn {
            role: "event dispatcher",
            source,
        })
}

/// Reads lines until the stream ends or fails, then fails outstanding
/// replies. Dropping `notifications` on return lets the dispatcher finish.
///
/// Lines longer than `max_line` bytes are cut short and the rest of the line
/// is skipped.
pub(super) fn read_loop<R: BufRead>(
    mut reader: R,
    max_line: usize,
    pending: &PendingReplies,
    notifications: &Sender<Notification>,
) {
    let mut buffer = Vec::new();
    loop {
        match read_bounded_line(&mut reader, max_line, &mut buffer) {
            Ok(LineRead::EndOfStream) => {
                debug!(target: CLIENT_TARGET, "management connection closed by peer");
                break;
            }
            Ok(LineRead::Complete) => {
                route_line(trim_line_ending(&buffer), pending, notifications);
            }
            Ok(LineRead::Truncated) => {
                warn!(
                    target: CLIENT_TARGET,
                    limit = max_line,
                    "truncated oversized line from management connection"
                );
                route_truncated(trim_line_ending(&buffer), pending, notifications);
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => {
                debug!(
                    target: CLIENT_TARGET,
                    error = %error,
                    "management connection read failed"
                );
                break;
            }
        }
    }
    pending.close();
}

fn read_bounded_line<R: BufRead>(
    reader: &mut R,
    max_line: usize,
    buffer: &mut Vec<u8>,
) -> io::Result<LineRead> {
    buffer.clear();
    let limit = u64::try_from(max_line).unwrap_or(u64::MAX);
    let read = reader.by_ref().take(limit).read_until(b'\n', buffer)?;
    if read == 0 {
        return Ok(LineRead::EndOfStream);
    }
    if read < max_line || buffer.ends_with(b"\n") {
        return Ok(LineRead::Complete);
    }
    skip_rest_of_line(reader)?;
    Ok(LineRead::Truncated)
}

fn skip_rest_of_line<R: BufRead>(reader: &mut R) -> io::Result<()> {
    loop {
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };
        if available.is_empty() {
            return Ok(());
        }
        if let Some(newline) = available.iter().position(|byte| *byte == b'\n') {
            reader.consume(newline + 1);
            return Ok(());
        }
        let skipped = available.len();
        reader.consume(skipped);
    }
}

fn route_line(line: &[u8], pending: &PendingReplies, notifications: &Sender<Notification>) {
    match line.split_first() {
        Some((&NOTIFICATION_MARKER, payload)) => {
            // The dispatcher only goes away when the sink consumer has.
            let _ = notifications.send(Notification::Line(payload.to_vec()));
        }
        _ => route_reply_line(line, pending),
    }
}

fn route_truncated(line: &[u8], pending: &PendingReplies, notifications: &Sender<Notification>) {
    match line.split_first() {
        Some((&NOTIFICATION_MARKER, payload)) => {
            let _ = notifications.send(Notification::Truncated(payload.to_vec()));
        }
        _ => route_reply_line(line, pending),
    }
}

fn route_reply_line(line: &[u8], pending: &PendingReplies) {
    let text = String::from_utf8_lossy(line).into_owned();
    if let Some(unclaimed) = pending.accept_line(text) {
        warn!(
            target: CLIENT_TARGET,
            line = %unclaimed,
            "discarding reply line with no outstanding command"
        );
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let without_newline = line.strip_suffix(b"\n").unwrap_or(line);
    without_newline
        .strip_suffix(b"\r")
        .unwrap_or(without_newline)
}

pub(super) fn dispatch_events<S: EventSink>(notifications: &Receiver<Notification>, sink: &S) {
    for notification in notifications {
        let event = notification.into_event();
        trace!(target: CLIENT_TARGET, event = %event, "delivering notification");
        if sink.deliver(event).is_err() {
            debug!(
                target: CLIENT_TARGET,
                "event sink closed; discarding further notifications"
            );
            return;
        }
    }
}
