//! Pairing of command replies with the commands that asked for them.
//!
//! OpenVPN answers commands strictly in the order they were sent, so the
//! outstanding commands form a FIFO queue. The reader appends every
//! non-notification line to the reply at the front of the queue and hands
//! the reply back to its caller once the reply is complete.

use std::collections::VecDeque;
use std::fmt;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, PoisonError};

use super::ClientError;

const SUCCESS_PREFIX: &str = "SUCCESS:";
const ERROR_PREFIX: &str = "ERROR:";
const END_MARKER: &str = "END";

/// Shape of the reply a command produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// A single `SUCCESS:` or `ERROR:` line.
    Single,
    /// Payload lines terminated by `END`, or a lone `ERROR:` line.
    Multi,
}

pub(super) type ReplyResult = Result<Vec<String>, ClientError>;

struct PendingReply {
    kind: ReplyKind,
    lines: Vec<String>,
    respond_to: SyncSender<ReplyResult>,
}

impl PendingReply {
    /// Adds `line` and reports whether the reply is now complete.
    fn push(&mut self, line: String) -> bool {
        match self.kind {
            ReplyKind::Single => {
                self.lines.push(line);
                true
            }
            ReplyKind::Multi if line == END_MARKER => true,
            ReplyKind::Multi => {
                let is_error = self.lines.is_empty() && line.starts_with(ERROR_PREFIX);
                self.lines.push(line);
                is_error
            }
        }
    }

    fn complete(self) {
        // The caller may have stopped waiting; nothing else wants the reply.
        let _ = self.respond_to.send(Ok(self.lines));
    }
}

#[derive(Default)]
struct QueueState {
    replies: VecDeque<PendingReply>,
    closed: bool,
}

/// FIFO of replies awaited by callers, shared between callers and the reader.
#[derive(Default)]
pub(super) struct PendingReplies {
    state: Mutex<QueueState>,
}

impl fmt::Debug for PendingReplies {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PendingReplies")
            .finish_non_exhaustive()
    }
}

impl PendingReplies {
    /// Registers a reply slot for a command about to be written.
    pub(super) fn register(&self, kind: ReplyKind) -> Result<Receiver<ReplyResult>, ClientError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(ClientError::ConnectionClosed);
        }
        let (respond_to, receiver) = mpsc::sync_channel(1);
        state.replies.push_back(PendingReply {
            kind,
            lines: Vec::new(),
            respond_to,
        });
        Ok(receiver)
    }

    /// Routes one reply line. Returns the line back when no command is
    /// waiting for it.
    pub(super) fn accept_line(&self, line: String) -> Option<String> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(front) = state.replies.front_mut() else {
            return Some(line);
        };
        if front.push(line)
            && let Some(reply) = state.replies.pop_front()
        {
            reply.complete();
        }
        None
    }

    /// Fails every outstanding reply and refuses new registrations.
    pub(super) fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        for reply in state.replies.drain(..) {
            let _ = reply.respond_to.send(Err(ClientError::ConnectionClosed));
        }
    }

    #[cfg(test)]
    pub(super) fn outstanding(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replies
            .len()
    }
}

/// Interprets a single-line reply: `SUCCESS: <text>` yields `<text>`.
pub(super) fn parse_single(command: &str, lines: &[String]) -> Result<String, ClientError> {
    let Some(line) = lines.first() else {
        return Err(ClientError::malformed(command, lines));
    };
    if let Some(text) = line.strip_prefix(SUCCESS_PREFIX) {
        return Ok(text.trim_start().to_owned());
    }
    if let Some(message) = line.strip_prefix(ERROR_PREFIX) {
        return Err(ClientError::Server {
            message: message.trim_start().to_owned(),
        });
    }
    Err(ClientError::malformed(command, lines))
}

/// Interprets an `END`-terminated reply, surfacing a lone `ERROR:` line.
pub(super) fn parse_multi(lines: Vec<String>) -> Result<Vec<String>, ClientError> {
    if let [line] = lines.as_slice()
        && let Some(message) = line.strip_prefix(ERROR_PREFIX)
    {
        return Err(ClientError::Server {
            message: message.trim_start().to_owned(),
        });
    }
    Ok(lines)
}
