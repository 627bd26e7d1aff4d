// mdcollab-host library
// Room-based collaborative text server using tokio and tungstenite

// Rooms: canonical document + cursor registry per collaborative session
pub mod collaboration;
pub mod document;
pub mod session;

// WebSocket server
pub mod ws;

// Configuration
pub mod config;

// REST API
pub mod api;
