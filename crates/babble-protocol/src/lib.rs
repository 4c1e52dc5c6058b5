//! babble-protocol
//!
//! Wire-level encoding/decoding for babble.
//!
//! Every message in either direction is one frame:
//!
//! ```text
//! [8-byte unsigned length, native byte order][length bytes of payload]
//! ```
//!
//! The payload is UTF-8 text.
//!
//! - [`frame`]      : frame header helpers (no I/O)
//! - [`text_codec`] : command lines and answer text

pub mod error;
pub mod frame;
pub mod text_codec;

pub use error::ProtocolError;
pub use frame::{decode_header, encode_frame, encode_header, HEADER_LEN};
pub use text_codec::{
    decode_answer, format_answer, format_command, format_parse_error, parse_command,
    parse_payload, WireAnswer,
};
