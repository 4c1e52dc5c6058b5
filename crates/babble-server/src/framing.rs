//! Length-prefixed frame I/O on async byte streams.
//!
//! `send` writes the 8-byte header and the payload in one buffer;
//! `write_all` already retries partial and interrupted writes. `receive`
//! never yields a partial frame: a short read is reported as
//! [`FramingError::Closed`].

use std::io;

use babble_protocol::frame::{checked_len, decode_header, encode_frame, HEADER_LEN};
use babble_protocol::ProtocolError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum FramingError {
    /// Peer closed the stream (possibly mid-frame).
    #[error("connection closed by peer")]
    Closed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("i/o error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for FramingError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe => FramingError::Closed,
            _ => FramingError::Io(e),
        }
    }
}

/// Write one frame.
pub async fn send<W>(writer: &mut W, payload: &[u8]) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    encode_frame(payload, &mut buf);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame, rejecting payloads larger than `max_len`.
pub async fn receive<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>, FramingError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;

    let len = checked_len(decode_header(header), max_len)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_survive_a_duplex_pipe() {
        let (mut a, mut b) = tokio::io::duplex(64);

        send(&mut a, b"LOGIN alice").await.unwrap();
        send(&mut a, b"").await.unwrap();

        assert_eq!(receive(&mut b, 64).await.unwrap(), b"LOGIN alice");
        assert_eq!(receive(&mut b, 64).await.unwrap(), b"");
    }

    #[tokio::test]
    async fn short_read_is_a_close() {
        let (mut a, mut b) = tokio::io::duplex(64);

        // Header announces 10 bytes, only 3 arrive.
        a.write_all(&babble_protocol::encode_header(10)).await.unwrap();
        a.write_all(b"abc").await.unwrap();
        drop(a);

        assert!(matches!(receive(&mut b, 64).await, Err(FramingError::Closed)));
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_before_allocating() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&babble_protocol::encode_header(1 << 40)).await.unwrap();

        assert!(matches!(
            receive(&mut b, 4096).await,
            Err(FramingError::Protocol(ProtocolError::FrameTooLarge { .. }))
        ));
    }

    #[tokio::test]
    async fn slow_frame_read_on_its_own_task_survives_timeouts() {
        use std::time::Duration;
        use tokio::sync::mpsc;
        use tokio::time::{sleep, timeout};

        let (mut a, mut b) = tokio::io::duplex(64);
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok(frame) = receive(&mut b, 64).await {
                if tx.send(frame).is_err() {
                    break;
                }
            }
        });

        a.write_all(&babble_protocol::encode_header(5)).await.unwrap();
        a.write_all(b"OK").await.unwrap();
        assert!(timeout(Duration::from_millis(30), rx.recv()).await.is_err());
        sleep(Duration::from_millis(30)).await;
        a.write_all(b" RD").await.unwrap();

        let first = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(first.as_deref(), Some(&b"OK RD"[..]));

        send(&mut a, b"OK RDV").await.unwrap();
        let second = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(second.as_deref(), Some(&b"OK RDV"[..]));
    }

    #[tokio::test]
    async fn clean_eof_is_a_close() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        assert!(matches!(receive(&mut b, 64).await, Err(FramingError::Closed)));
    }
}
