//! Command and answer types.
//!
//! These are **transport-agnostic** logical messages:
//! - [`Command`]: one unit of work extracted from a client message.
//! - [`Answer`]: the result of executing a command.
//!
//! Text encoding lives in the `babble-protocol` crate; this module is
//! purely logical.

use std::fmt;

use crate::key::ClientKey;

/// Kind of a command, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Login,
    Publish,
    Follow,
    Timeline,
    FollowCount,
    Rdv,
    /// Never sent by a client: synthesized when a connection goes away.
    Unregister,
}

impl CommandKind {
    /// Wire verb for this kind.
    pub fn verb(self) -> &'static str {
        match self {
            CommandKind::Login => "LOGIN",
            CommandKind::Publish => "PUBLISH",
            CommandKind::Follow => "FOLLOW",
            CommandKind::Timeline => "TIMELINE",
            CommandKind::FollowCount => "FOLLOW_COUNT",
            CommandKind::Rdv => "RDV",
            CommandKind::Unregister => "UNREGISTER",
        }
    }

    /// Parse a wire verb (case-insensitive).
    pub fn from_verb(verb: &str) -> Option<Self> {
        const ALL: [CommandKind; 7] = [
            CommandKind::Login,
            CommandKind::Publish,
            CommandKind::Follow,
            CommandKind::Timeline,
            CommandKind::FollowCount,
            CommandKind::Rdv,
            CommandKind::Unregister,
        ];
        ALL.into_iter().find(|k| k.verb().eq_ignore_ascii_case(verb))
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Kind-specific payload of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Register under `name`.
    Login { name: String },

    /// Publish `text` to self and all followers.
    Publish { text: String },

    /// Start following the client registered as `name`.
    Follow { name: String },

    /// Read the issuer's own timeline.
    Timeline,

    /// Count the issuer's followers.
    FollowCount,

    /// Wait until all of the issuer's earlier commands completed.
    Rdv,

    /// Drain and remove the issuer's registration.
    Unregister,
}

impl Request {
    pub fn kind(&self) -> CommandKind {
        match self {
            Request::Login { .. } => CommandKind::Login,
            Request::Publish { .. } => CommandKind::Publish,
            Request::Follow { .. } => CommandKind::Follow,
            Request::Timeline => CommandKind::Timeline,
            Request::FollowCount => CommandKind::FollowCount,
            Request::Rdv => CommandKind::Rdv,
            Request::Unregister => CommandKind::Unregister,
        }
    }
}

/// A unit of work extracted from one client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Issuer identity; `UNASSIGNED` until LOGIN completes.
    pub key: ClientKey,

    /// What to do.
    pub request: Request,

    /// When `false`, the worker executes the command but sends nothing back.
    pub answer_expected: bool,
}

impl Command {
    pub fn new(key: ClientKey, request: Request) -> Self {
        Command {
            key,
            request,
            answer_expected: true,
        }
    }

    /// The command synthesized when `key`'s connection closes.
    pub fn unregister(key: ClientKey) -> Self {
        Command {
            key,
            request: Request::Unregister,
            answer_expected: false,
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.request.kind()
    }
}

/// Outcome of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

/// Result of executing a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Identity of the client the answer is for.
    pub key: ClientKey,

    /// Kind of the command that produced it.
    pub kind: CommandKind,

    pub status: Status,

    /// Single-line detail (`"3"` for FOLLOW_COUNT, a reason for errors, ...).
    pub detail: String,

    /// Extra lines after the header; TIMELINE items go here.
    pub lines: Vec<String>,

    /// Set when nobody is waiting for this answer.
    pub suppressed: bool,
}

impl Answer {
    /// Successful answer with a one-line detail.
    pub fn ok(key: ClientKey, kind: CommandKind, detail: impl Into<String>) -> Self {
        Answer {
            key,
            kind,
            status: Status::Ok,
            detail: detail.into(),
            lines: Vec::new(),
            suppressed: false,
        }
    }

    /// Failed answer with a reason.
    pub fn error(key: ClientKey, kind: CommandKind, reason: impl Into<String>) -> Self {
        Answer {
            key,
            kind,
            status: Status::Error,
            detail: reason.into(),
            lines: Vec::new(),
            suppressed: false,
        }
    }

    pub fn with_lines(mut self, lines: Vec<String>) -> Self {
        self.lines = lines;
        self
    }

    /// Mark the answer as not-to-be-sent.
    pub fn suppress(mut self) -> Self {
        self.suppressed = true;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_round_trip_case_insensitively() {
        assert_eq!(CommandKind::from_verb("follow_count"), Some(CommandKind::FollowCount));
        assert_eq!(CommandKind::from_verb("Rdv"), Some(CommandKind::Rdv));
        assert_eq!(CommandKind::from_verb("SHOUT"), None);
    }

    #[test]
    fn unregister_is_silent() {
        let cmd = Command::unregister(ClientKey(7));
        assert_eq!(cmd.kind(), CommandKind::Unregister);
        assert!(!cmd.answer_expected);
    }
}
