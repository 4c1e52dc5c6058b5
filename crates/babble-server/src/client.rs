//! Per-connection state machine.
//!
//! ```text
//! AwaitingLogin --LOGIN ok--> Active --peer close / read error--> Draining --> Closed
//!       |                                                            ^
//!       +--bad first frame / LOGIN refused---------------------------+ (no unregister)
//! ```
//!
//! LOGIN is executed inline so its answer goes out before anything else
//! from this client is accepted. In Active every parsed command is
//! queued and the task goes straight back to reading; parse failures are
//! answered inline and never queued. On the way out the connection runs
//! UNREGISTER itself, which waits for the client's queued commands.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use babble_core::{ClientKey, Command, Request};
use babble_protocol::{format_answer, format_parse_error, parse_payload};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatch::{login_answer, Dispatcher, Job};
use crate::framing::{self, FramingError};
use crate::queue::QueueSet;
use crate::record::ClientRecord;
use crate::types::{ConnectionHandle, ConnectionId, OutboundRx};

/// What every connection task needs from the server.
#[derive(Debug)]
pub(crate) struct ConnectionContext {
    pub dispatcher: Arc<Dispatcher>,
    pub queues: Arc<QueueSet>,
    pub max_frame_len: usize,
}

/// Run the full lifecycle of one accepted connection.
pub(crate) async fn run_client(
    conn_id: ConnectionId,
    peer: SocketAddr,
    stream: TcpStream,
    ctx: Arc<ConnectionContext>,
) -> anyhow::Result<()> {
    let (mut reader, writer) = stream.into_split();

    // Writer task: owns the write half, closes it once every handle is gone.
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(run_writer(conn_id, writer, out_rx));
    let connection = ConnectionHandle::new(conn_id, out_tx);

    if let Some(record) = await_login(peer, &mut reader, connection, &ctx).await {
        let key = record.key();
        run_active(&mut reader, &record, &ctx).await;

        drop(record);
        ctx.dispatcher.unregister(&Command::unregister(key)).await;
    }

    writer_task.await.context("writer task failed")?;
    debug!(conn = conn_id.0, %peer, "connection closed");
    Ok(())
}

/// AwaitingLogin: the first frame must be a valid LOGIN.
async fn await_login(
    peer: SocketAddr,
    reader: &mut OwnedReadHalf,
    connection: ConnectionHandle,
    ctx: &ConnectionContext,
) -> Option<Arc<ClientRecord>> {
    let payload = match framing::receive(reader, ctx.max_frame_len).await {
        Ok(p) => p,
        Err(e) => {
            debug!(%peer, "no LOGIN received: {}", e);
            return None;
        }
    };

    let name = match parse_payload(&payload, ClientKey::UNASSIGNED) {
        Ok(cmd) => match cmd.request {
            Request::Login { name } => name,
            other => {
                warn!(%peer, "expected LOGIN, got {}", other.kind());
                return None;
            }
        },
        Err(e) => {
            warn!(%peer, "invalid LOGIN message: {}", e);
            return None;
        }
    };

    let key = ClientKey::from_name(&name);
    let result = ctx.dispatcher.login(&name, connection.clone()).await;
    connection.send_text(format_answer(&login_answer(key, &result)));

    match result {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(%peer, name = %name, "LOGIN refused: {}", e);
            None
        }
    }
}

/// Active: parse and queue until the peer goes away.
async fn run_active(reader: &mut OwnedReadHalf, record: &Arc<ClientRecord>, ctx: &ConnectionContext) {
    let key = record.key();
    let queue = ctx.queues.for_key(key);

    loop {
        let payload = match framing::receive(reader, ctx.max_frame_len).await {
            Ok(p) => p,
            Err(FramingError::Closed) => {
                info!(%key, name = record.name(), "client disconnected");
                return;
            }
            Err(e) => {
                warn!(%key, "dropping connection: {}", e);
                return;
            }
        };

        match parse_payload(&payload, key) {
            Ok(command) => {
                if queue.enqueue(Job::admit(record, command)).await.is_err() {
                    info!(%key, "command queue closed, leaving");
                    return;
                }
            }
            Err(e) => {
                debug!(%key, "unable to parse message: {}", e);
                record.connection().send_text(format_parse_error(&e));
            }
        }
    }
}

async fn run_writer(conn_id: ConnectionId, mut writer: OwnedWriteHalf, mut out_rx: OutboundRx) {
    while let Some(frame) = out_rx.recv().await {
        if let Err(e) = framing::send(&mut writer, &frame).await {
            debug!(conn = conn_id.0, "write failed: {}", e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}
