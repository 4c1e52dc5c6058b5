//! babble-core
//!
//! Pure messaging logic shared by the protocol and server crates:
//! - identity keys derived from login names
//! - command / answer types
//! - field size limits
//! - the per-client timeline store

pub mod error;
pub mod key;
pub mod limits;
pub mod messages;
pub mod timeline;

pub use error::CoreError;
pub use key::ClientKey;
pub use messages::{Answer, Command, CommandKind, Request, Status};
pub use timeline::{Publication, Timeline};
