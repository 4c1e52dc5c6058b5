//! Error types for the core babble logic.
//!
//! The core is mostly infallible; the only failures are field
//! validation problems caught before a command is built.

use thiserror::Error;

use crate::limits::{MAX_ID_LEN, MAX_PUBLICATION_LEN};

/// A field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Identifier is empty.
    #[error("empty identifier")]
    EmptyName,

    /// Identifier is longer than [`MAX_ID_LEN`] bytes.
    #[error("identifier is {0} bytes, max is {max}", max = MAX_ID_LEN)]
    NameTooLong(usize),

    /// Identifier contains whitespace or control characters.
    #[error("identifier contains invalid characters")]
    InvalidName,

    /// Publication text is empty.
    #[error("empty publication")]
    EmptyPublication,

    /// Publication text is longer than [`MAX_PUBLICATION_LEN`] bytes.
    #[error("publication is {0} bytes, max is {max}", max = MAX_PUBLICATION_LEN)]
    PublicationTooLong(usize),

    /// Publication text contains a line break or other control character.
    #[error("publication must be a single line without control characters")]
    InvalidPublication,
}
