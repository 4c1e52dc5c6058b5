//! Identity keys.
//!
//! A client is identified by a numeric hash of its login name. Two
//! names that hash to the same key are treated as the same identity,
//! so the second LOGIN is rejected as a duplicate.

use std::fmt;

/// Numeric identity of a logged-in client.
///
/// `0` is reserved to mean "no identity yet" (before LOGIN completes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ClientKey(pub u64);

impl ClientKey {
    /// The key carried by commands before login completes.
    pub const UNASSIGNED: ClientKey = ClientKey(0);

    /// Derive the key for a login name (djb2 over the raw bytes).
    pub fn from_name(name: &str) -> Self {
        let hash = name
            .bytes()
            .fold(5381u64, |h, b| h.wrapping_mul(33).wrapping_add(u64::from(b)));

        // Keep 0 free for UNASSIGNED.
        if hash == 0 {
            ClientKey(1)
        } else {
            ClientKey(hash)
        }
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
