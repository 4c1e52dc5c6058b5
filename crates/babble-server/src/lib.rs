//! babble-server
//!
//! Multi-client TCP server for babble.
//!
//! Connection tasks parse client frames into commands and push them on
//! a bounded command queue; a fixed pool of workers executes them
//! against the shared registration directory and answers on the
//! originating connection.

pub mod config;
pub mod directory;
pub mod dispatch;
pub mod framing;
pub mod queue;
pub mod record;
pub mod server;
pub mod types;
pub mod worker;

// per-connection state machine, driven by `server`
mod client;
