//! Interactive babble client.
//!
//! ```text
//! cargo run -p babble-server --example babble_client -- alice
//! ```

use std::env;
use std::io::{self, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use babble_core::ClientKey;
use babble_protocol::{decode_answer, format_command, parse_command};
use babble_server::framing::{self, FramingError};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

const MAX_FRAME_LEN: usize = 1 << 20;

#[tokio::main]
async fn main() -> Result<()> {
    // Where to connect: env override or default.
    let addr = env::var("BABBLE_CLIENT_ADDR").unwrap_or_else(|_| "127.0.0.1:5656".to_string());
    let name = env::args().nth(1).unwrap_or_else(|| "guest".to_string());

    println!("Connecting to {}...", addr);
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("cannot connect to {}", addr))?;
    let (mut reader, mut writer) = stream.into_split();

    framing::send(&mut writer, format!("LOGIN {}", name).as_bytes()).await?;
    let login = framing::receive(&mut reader, MAX_FRAME_LEN).await?;
    let login = decode_answer(std::str::from_utf8(&login)?)?;
    if !login.ok {
        bail!("login refused: {}", login.detail);
    }
    println!("Logged in as {} (key {}).", name, login.detail);
    println!("Type commands like:");
    println!("  PUBLISH hello world");
    println!("  FOLLOW bob");
    println!("  TIMELINE | FOLLOW_COUNT | RDV");
    println!("  S PUBLISH fire-and-forget");
    println!("Type 'quit' or 'exit' to leave.\n");

    // `receive` is not cancel-safe; the prompt loop only times out on the channel.
    let (frames_tx, mut frames) = mpsc::unbounded_channel();
    tokio::spawn(read_frames(reader, frames_tx));

    let stdin = io::stdin();

    loop {
        print!(">> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            println!("\nEOF on stdin, exiting client.");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
            println!("Exiting client.");
            break;
        }

        // Validate locally so typos don't cost a round trip.
        let command = match parse_command(trimmed, ClientKey::from_name(&name)) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Not sent: {}", e);
                continue;
            }
        };
        framing::send(&mut writer, format_command(&command).as_bytes()).await?;

        // Print whatever arrives shortly after; streamed commands get nothing.
        loop {
            let frame = match timeout(Duration::from_millis(200), frames.recv()).await {
                Ok(Some(Ok(frame))) => frame,
                Ok(Some(Err(FramingError::Closed))) | Ok(None) => {
                    println!("Server closed the connection.");
                    return Ok(());
                }
                Ok(Some(Err(e))) => return Err(e.into()),
                Err(_) => break,
            };
            println!("<< {}", String::from_utf8_lossy(&frame));
        }
    }

    Ok(())
}

/// Forward every frame from the server until the stream ends or fails.
async fn read_frames(
    mut reader: OwnedReadHalf,
    frames: mpsc::UnboundedSender<Result<Vec<u8>, FramingError>>,
) {
    loop {
        let frame = framing::receive(&mut reader, MAX_FRAME_LEN).await;
        let done = frame.is_err();
        if frames.send(frame).is_err() || done {
            return;
        }
    }
}
