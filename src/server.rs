use crate::bus::{Event, EventBus};
use crate::protocol::{Request, Response};
use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Accepts JSON-lines requests on a Unix socket and forwards them to the
/// manager's loop, one response line per request line.
pub async fn serve(socket_path: PathBuf, bus: EventBus) -> Result<()> {
    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent)?;
    }
    if socket_path.exists() {
        fs::remove_file(&socket_path)?;
    }
    let listener = UnixListener::bind(&socket_path)?;
    info!("Listening on {}", socket_path.display());

    loop {
        let (stream, _) = listener.accept().await?;
        let bus = bus.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, bus).await {
                warn!("Client connection error: {}", e);
            }
        });
    }
}

async fn handle_connection(stream: UnixStream, bus: EventBus) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                let (reply, rx) = oneshot::channel();
                bus.publish(Event::Request { request, reply }).await;
                rx.await
                    .unwrap_or_else(|_| Response::failure("Engine unavailable"))
            }
            Err(_) => Response::unknown_action(),
        };
        let mut payload = serde_json::to_vec(&response)?;
        payload.push(b'\n');
        writer.write_all(&payload).await?;
    }
    Ok(())
}
