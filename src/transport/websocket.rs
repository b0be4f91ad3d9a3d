//! WebSocket transport
//!
//! Each accepted connection gets:
//! - a bounded outbound queue registered with the hub as a `Subscriber`
//! - a writer task draining that queue into the socket, with a per-write
//!   timeout so a peer that stops reading is eventually dropped
//! - a reader loop that ignores incoming text and ends on close, error,
//!   writer failure or server shutdown
//!
//! Whichever side ends first removes the subscriber from the hub.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::hub::{HubHandle, Subscriber};
use crate::utils::error::RelayError;

/// The greeting and the snapshot must both fit in a fresh queue.
const MIN_QUEUE: usize = 2;

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub subscriber_queue: usize,
    pub send_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            subscriber_queue: 32,
            send_timeout: Duration::from_secs(5),
        }
    }
}

pub async fn bind(addr: &str) -> Result<TcpListener, RelayError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| RelayError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Accepts connections until `stop_accepting` is cancelled. Connection
/// tasks are spawned on `tracker` and end when `close_connections` is
/// cancelled, so the caller can shut the hub down in between.
pub async fn serve(
    listener: TcpListener,
    hub: HubHandle,
    options: ServerOptions,
    stop_accepting: CancellationToken,
    close_connections: CancellationToken,
    tracker: TaskTracker,
) {
    if let Ok(addr) = listener.local_addr() {
        info!("WebSocket server listening on ws://{addr}");
    }

    loop {
        tokio::select! {
            _ = stop_accepting.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracker.spawn(handle_connection(
                        stream,
                        peer,
                        hub.clone(),
                        options.clone(),
                        close_connections.clone(),
                    ));
                }
                Err(e) => warn!("accept failed: {e}"),
            },
        }
    }

    info!("WebSocket server stopped accepting");
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    hub: HubHandle,
    options: ServerOptions,
    shutdown: CancellationToken,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, "WebSocket handshake error: {e}");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (tx, mut rx) = mpsc::channel::<WsMessage>(options.subscriber_queue.max(MIN_QUEUE));
    let subscriber = Subscriber::new(tx);
    let subscriber_id = subscriber.id.clone();
    if !hub.connect(subscriber) {
        // A refused subscriber may still have a close frame queued.
        while let Ok(msg) = rx.try_recv() {
            if timeout(options.send_timeout, ws_sender.send(msg)).await.is_err() {
                break;
            }
        }
        return;
    }
    debug!(subscriber = %subscriber_id, %peer, "connection registered");

    let connection = shutdown.child_token();

    let writer = {
        let hub = hub.clone();
        let subscriber_id = subscriber_id.clone();
        let connection = connection.clone();
        let send_timeout = options.send_timeout;

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = msg.is_close();
                match timeout(send_timeout, ws_sender.send(msg)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(subscriber = %subscriber_id, "send failed: {e}");
                        break;
                    }
                    Err(_) => {
                        warn!(subscriber = %subscriber_id, "send timed out");
                        break;
                    }
                }
                if closing {
                    break;
                }
            }

            hub.remove(&subscriber_id);
            connection.cancel();
            let _ = timeout(send_timeout, ws_sender.close()).await;
        })
    };

    loop {
        tokio::select! {
            _ = connection.cancelled() => break,
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(msg)) => {
                    if msg.is_text() {
                        debug!(subscriber = %subscriber_id, "ignoring inbound text");
                    }
                }
                Some(Err(e)) => {
                    debug!(subscriber = %subscriber_id, "read error: {e}");
                    break;
                }
            },
        }
    }

    // Dropping the hub's sender lets the writer drain and finish.
    hub.remove(&subscriber_id);
    let _ = timeout(options.send_timeout, writer).await;
    info!(subscriber = %subscriber_id, %peer, "subscriber disconnected");
}
