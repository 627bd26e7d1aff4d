//! Async WebSocket server using tokio-tungstenite
//!
//! Handles multiple concurrent connections, each joined to one room.
//! Includes origin validation and per-connection flood control.
//!
//! ## Module Structure
//! - `protocol`: URI parsing, origin validation, frame decoding
//! - `connection`: WebSocket handshake, room membership, socket bridge
//! - `commands`: client message handlers
//! - `rate_limit`: token bucket

mod commands;
mod connection;
mod protocol;
mod rate_limit;

pub use rate_limit::RateLimiter;

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;

use crate::config::{Config, SyncConfig};
use crate::session::SharedRoomManager;

// Re-export for external use
pub use commands::{flush_cursor, handle_client_message, Origin};
pub use connection::{handle_connection, ConnectionInfo};
pub use protocol::{decode_client_frame, parse_room_from_uri, validate_origin, ALLOWED_ORIGINS};

/// Bind the configured WebSocket address and serve forever
pub async fn serve(manager: SharedRoomManager, config: &Config) -> Result<()> {
    let addr = format!("{}:{}", config.server.bind, config.server.ws_port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "WebSocket server listening");
    serve_on(listener, manager, config.sync.clone()).await
}

/// Accept loop on an already bound listener
pub async fn serve_on(listener: TcpListener, manager: SharedRoomManager, settings: SyncConfig) -> Result<()> {
    let settings = Arc::new(settings);
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let manager = manager.clone();
                let settings = settings.clone();

                tokio::spawn(async move {
                    if let Err(e) = connection::handle_connection(stream, manager, settings).await {
                        tracing::warn!(peer = %addr, error = %e, "Connection error");
                    }
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Accept failed");
            }
        }
    }
}
