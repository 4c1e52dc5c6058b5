//! Field size limits and validation helpers.

use crate::error::CoreError;

/// Maximum size of a client identifier, in bytes.
pub const MAX_ID_LEN: usize = 32;

/// Maximum size of a publication, in bytes.
pub const MAX_PUBLICATION_LEN: usize = 64;

/// Validate a login / follow name: one token, 1..=`MAX_ID_LEN` bytes.
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::EmptyName);
    }
    if name.len() > MAX_ID_LEN {
        return Err(CoreError::NameTooLong(name.len()));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CoreError::InvalidName);
    }
    Ok(())
}

/// Validate publication text: one line of 1..=`MAX_PUBLICATION_LEN` bytes.
///
/// Control characters (line breaks included) are refused so a stored
/// publication always renders as exactly one timeline line.
pub fn validate_publication(text: &str) -> Result<(), CoreError> {
    if text.is_empty() {
        return Err(CoreError::EmptyPublication);
    }
    if text.len() > MAX_PUBLICATION_LEN {
        return Err(CoreError::PublicationTooLong(text.len()));
    }
    if text.chars().any(char::is_control) {
        return Err(CoreError::InvalidPublication);
    }
    Ok(())
}
