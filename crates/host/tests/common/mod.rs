//! Common test utilities
#![allow(dead_code)] // Not every helper is used by every test file

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use mdcollab_host::config::{RoomConfig, SyncConfig};
use mdcollab_host::session::{RoomManager, SharedRoomManager};
use mdcollab_host::ws::serve_on;
use mdcollab_protocol::{decode, encode, ClientMessage, ServerMessage};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Start a server on an ephemeral port
pub async fn start_server() -> (SharedRoomManager, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let rooms = RoomManager::shared(&RoomConfig::default());
    tokio::spawn(serve_on(listener, rooms.clone(), SyncConfig::default()));
    (rooms, addr)
}

pub async fn connect(addr: SocketAddr, room: &str) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/?room={room}")).await.unwrap();
    ws
}

/// Connect and consume the initial `load-document`; returns the assigned id
pub async fn join(addr: SocketAddr, room: &str) -> (Client, String, String) {
    let mut client = connect(addr, room).await;
    match recv(&mut client).await {
        ServerMessage::LoadDocument { client_id, text, .. } => (client, client_id, text),
        other => panic!("expected load-document, got {other:?}"),
    }
}

pub async fn send(client: &mut Client, msg: &ClientMessage) {
    client.send(Message::Binary(encode(msg).unwrap())).await.unwrap();
}

async fn next_message(client: &mut Client) -> Option<ServerMessage> {
    while let Some(frame) = client.next().await {
        match frame.ok()? {
            Message::Binary(bytes) => return Some(decode(&bytes).unwrap()),
            Message::Close(_) => return None,
            _ => {}
        }
    }
    None
}

/// Next server message, skipping control frames
pub async fn recv(client: &mut Client) -> ServerMessage {
    tokio::time::timeout(RECV_TIMEOUT, next_message(client))
        .await
        .expect("timed out waiting for server message")
        .expect("connection closed")
}

/// True if nothing but control frames arrives within `window`
pub async fn stays_quiet(client: &mut Client, window: Duration) -> bool {
    tokio::time::timeout(window, next_message(client)).await.is_err()
}

/// Poll `check` against the room manager until it holds
pub async fn eventually<F>(rooms: &SharedRoomManager, check: F)
where
    F: Fn(&RoomManager) -> bool,
{
    for _ in 0..100 {
        if check(&*rooms.read().await) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}
