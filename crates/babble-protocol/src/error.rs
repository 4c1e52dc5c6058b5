//! Errors raised while decoding frames or command text.

use babble_core::{CommandKind, CoreError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Nothing left after trimming.
    #[error("empty command")]
    Empty,

    /// Payload is not UTF-8.
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    /// First token is not a known verb.
    #[error("unknown command '{0}'")]
    UnknownVerb(String),

    /// Verb takes no argument but one was given.
    #[error("{0} takes no argument")]
    UnexpectedArgument(CommandKind),

    /// Verb exists but clients may not send it.
    #[error("{0} cannot be sent by a client")]
    NotClientCommand(CommandKind),

    /// `S` prefix on a command that must be answered.
    #[error("{0} cannot be streamed")]
    NotStreamable(CommandKind),

    /// Name or publication failed validation.
    #[error("invalid {kind} argument: {source}")]
    InvalidField {
        kind: CommandKind,
        #[source]
        source: CoreError,
    },

    /// Length prefix above the configured maximum.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: u64, max: usize },

    /// Answer text does not start with `OK` / `ERR` and a kind.
    #[error("malformed answer: {0}")]
    MalformedAnswer(String),
}
