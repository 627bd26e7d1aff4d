//! REST API server for mdcollab
//!
//! Read-only HTTP endpoints for health checks and room inspection.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::session::{RoomInfo, SharedRoomManager};

// Shared state
#[derive(Clone)]
pub struct AppState {
    pub rooms: SharedRoomManager,
    pub ws_port: u16,
}

// Routes
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/rooms", get(list_rooms))
        .route("/rooms/:id", get(get_room))
}

// Handlers

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn list_rooms(State(state): State<AppState>) -> Json<serde_json::Value> {
    let rooms: Vec<RoomInfo> = state.rooms.read().await.list();
    Json(serde_json::json!({ "rooms": rooms }))
}

async fn get_room(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let snapshot = state.rooms.read().await.snapshot(&id);
    match snapshot {
        Some(snapshot) => (StatusCode::OK, Json(serde_json::json!(snapshot))),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "room not found" })),
        ),
    }
}
