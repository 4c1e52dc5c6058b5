//! Shared types for the babble server.
//!
//! This module defines:
//! - `ConnectionId`: a lightweight handle for accepted connections
//! - channel aliases between workers and a connection's writer task
//! - `ConnectionHandle`: the only way anything but the connection task
//!   can talk to a socket

use bytes::Bytes;
use tokio::sync::mpsc;

/// Identifier for an accepted connection.
///
/// This is intentionally opaque; we just guarantee uniqueness
/// over the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Outbound frame payloads for one connection's writer task.
pub type OutboundTx = mpsc::UnboundedSender<Bytes>;
pub type OutboundRx = mpsc::UnboundedReceiver<Bytes>;

/// Opaque handle to a connection's writer.
///
/// Cloning the handle does not duplicate the socket: the writer task
/// owns the write half and closes it once every handle is dropped.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: OutboundTx,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, tx: OutboundTx) -> Self {
        ConnectionHandle { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue one frame payload. Returns `false` if the writer is gone.
    pub fn send_text(&self, text: String) -> bool {
        self.tx.send(Bytes::from(text)).is_ok()
    }
}
