//! WebSocket connection handling
//!
//! Manages individual WebSocket connections: handshake, room membership,
//! and the bidirectional bridge between the socket and the room.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::{Sink, SinkExt, StreamExt};
use mdcollab_protocol::{encode, RoomId, ServerMessage};
use mdcollab_sync::Throttle;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, Mutex};
use tokio_tungstenite::tungstenite::{
    handshake::server::{Request, Response},
    Message,
};

use crate::config::SyncConfig;
use crate::session::{RoomEvent, SharedRoomManager};

use super::commands::{flush_cursor, handle_client_message, Origin};
use super::protocol::{decode_client_frame, parse_room_from_uri, validate_origin};
use super::rate_limit::RateLimiter;

/// What the upgrade request told us about the peer
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    pub room: RoomId,
    pub origin: Option<String>,
    pub origin_valid: bool,
}

impl ConnectionInfo {
    fn from_request(req: &Request) -> Self {
        let origin = req
            .headers()
            .get(http::header::ORIGIN)
            .map(|value| value.to_str().map(str::to_string));
        let (origin, origin_valid) = match origin {
            // Same-origin request or a non-browser client
            None => (None, true),
            Some(Ok(origin)) => {
                let valid = validate_origin(&origin);
                (Some(origin), valid)
            }
            Some(Err(_)) => (None, false),
        };
        Self {
            room: parse_room_from_uri(&req.uri().to_string()),
            origin,
            origin_valid,
        }
    }
}

/// Serve one socket from upgrade to departure
pub async fn handle_connection<S>(stream: S, manager: SharedRoomManager, settings: Arc<SyncConfig>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let captured = Arc::new(std::sync::Mutex::new(ConnectionInfo::default()));
    let slot = captured.clone();
    let callback = move |req: &Request,
                         response: Response|
          -> std::result::Result<Response, http::Response<Option<String>>> {
        if let Ok(mut info) = slot.lock() {
            *info = ConnectionInfo::from_request(req);
        }
        Ok(response)
    };

    let ws = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
    let (mut ws_tx, ws_rx) = ws.split();

    let info = captured
        .lock()
        .map(|info| info.clone())
        .map_err(|_| anyhow::anyhow!("connection info lock poisoned"))?;
    if !info.origin_valid {
        tracing::warn!(origin = ?info.origin, "Rejected connection from invalid origin");
        let _ = ws_tx.close().await;
        anyhow::bail!("invalid origin");
    }

    let client_id = uuid::Uuid::new_v4().to_string();
    let room = info.room;

    let joined = manager.write().await.join(&room, &client_id);
    let joined = match joined {
        Ok(joined) => joined,
        Err(e) => {
            let _ = ws_tx.close().await;
            return Err(e.into());
        }
    };

    tracing::info!(room = %room, client_id = %client_id, "Client connected");

    let origin = Origin {
        room: &room,
        client_id: &client_id,
    };
    let result = bridge(ws_tx, ws_rx, &origin, &manager, joined.load, joined.events, &settings).await;

    manager.write().await.leave(&room, &client_id);
    tracing::info!(room = %room, client_id = %client_id, "Client disconnected");
    result
}

/// Encode and send one message
async fn send_message<W>(tx: &Mutex<W>, msg: &ServerMessage) -> Result<()>
where
    W: Sink<Message> + Unpin,
    W::Error: std::error::Error + Send + Sync + 'static,
{
    let bytes = encode(msg)?;
    tx.lock().await.send(Message::Binary(bytes)).await?;
    Ok(())
}

/// Socket <-> room bridge; returns when the socket closes or goes idle
async fn bridge<W, R>(
    ws_tx: W,
    mut ws_rx: R,
    origin: &Origin<'_>,
    manager: &SharedRoomManager,
    load: ServerMessage,
    mut events: broadcast::Receiver<RoomEvent>,
    settings: &SyncConfig,
) -> Result<()>
where
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: std::error::Error + Send + Sync + 'static,
    R: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let ws_tx = Arc::new(Mutex::new(ws_tx));
    send_message(&ws_tx, &load).await?;

    // Dedicated sender task for room events
    let ws_tx_sender = ws_tx.clone();
    let sender_manager = manager.clone();
    let sender_room = origin.room.to_string();
    let sender_id = origin.client_id.to_string();

    let sender_handle = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Some(msg) = event.for_recipient(&sender_id) else {
                        continue;
                    };
                    if let Err(e) = send_message(&ws_tx_sender, &msg).await {
                        tracing::warn!(client_id = %sender_id, error = %e, "Send failed, stopping sender");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        client_id = %sender_id,
                        dropped_messages = n,
                        "Room events lagged, sending full resync"
                    );
                    // Everything still queued predates the snapshot
                    while !matches!(
                        events.try_recv(),
                        Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed)
                    ) {}

                    let resync = sender_manager.read().await.resync(&sender_room, &sender_id);
                    let Some(messages) = resync else {
                        break;
                    };
                    for msg in &messages {
                        if send_message(&ws_tx_sender, msg).await.is_err() {
                            return;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    });

    // Rate limiter: burst then sustained refill
    let mut rate_limiter = RateLimiter::from_config(settings);
    let mut cursor_throttle = Throttle::new(settings.cursor_window());

    let heartbeat_timeout = settings.idle_timeout();
    let mut heartbeat_interval = tokio::time::interval(settings.heartbeat_interval().max(Duration::from_millis(1)));
    let mut cursor_flush = tokio::time::interval(settings.cursor_window().max(Duration::from_millis(1)));
    cursor_flush.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            // Ping, or give up on a silent peer
            _ = heartbeat_interval.tick() => {
                if last_activity.elapsed() > heartbeat_timeout {
                    tracing::warn!(
                        client_id = %origin.client_id,
                        elapsed_secs = last_activity.elapsed().as_secs(),
                        "Connection idle timeout"
                    );
                    break;
                }

                let mut tx = ws_tx.lock().await;
                if tx.send(Message::Ping(vec![])).await.is_err() {
                    tracing::debug!(client_id = %origin.client_id, "Ping send failed");
                    break;
                }
            }

            // Trailing edge of the cursor throttle
            _ = cursor_flush.tick(), if cursor_throttle.has_pending() => {
                if let Err(e) = flush_cursor(origin, manager, &mut cursor_throttle).await {
                    tracing::warn!(client_id = %origin.client_id, error = %e, "Cursor flush failed");
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(msg @ (Message::Binary(_) | Message::Text(_)))) => {
                        last_activity = Instant::now();

                        if !rate_limiter.try_consume() {
                            tracing::warn!(client_id = %origin.client_id, "Rate limit exceeded, dropping message");
                            continue;
                        }

                        match decode_client_frame(&msg) {
                            Ok(Some(client_msg)) => {
                                if let Err(e) = handle_client_message(origin, manager, &mut cursor_throttle, client_msg).await {
                                    tracing::warn!(client_id = %origin.client_id, error = %e, "Message rejected");
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::debug!(client_id = %origin.client_id, error = %e, "Dropping undecodable frame");
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_) | Message::Ping(_))) => {
                        last_activity = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(client_id = %origin.client_id, error = %e, "Socket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    sender_handle.abort();
    Ok(())
}
