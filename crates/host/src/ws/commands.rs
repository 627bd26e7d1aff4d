//! Client message handlers
//!
//! Applies decoded `ClientMessage`s to the connection's room. Cursor
//! reports pass through a per-connection throttle first; the connection
//! loop flushes whatever it coalesced on its tick.

use mdcollab_protocol::ClientMessage;
use mdcollab_sync::{Clock, Emission, Throttle};

use crate::session::{RoomError, SharedRoomManager};

/// Identity of the connection a message arrived on
#[derive(Debug, Clone)]
pub struct Origin<'a> {
    pub room: &'a str,
    pub client_id: &'a str,
}

/// Handle one message from the browser
#[tracing::instrument(skip_all, fields(room = %origin.room, client_id = %origin.client_id, kind = msg.kind()), level = "debug")]
pub async fn handle_client_message<C: Clock>(
    origin: &Origin<'_>,
    manager: &SharedRoomManager,
    cursor_throttle: &mut Throttle<usize, C>,
    msg: ClientMessage,
) -> Result<(), RoomError> {
    match msg {
        ClientMessage::SendText { text } => {
            let revision = manager.write().await.apply_text(origin.room, origin.client_id, text)?;
            tracing::debug!(revision, "Text applied");
        }
        ClientMessage::SendCursor { offset, client_id } => {
            if client_id != origin.client_id {
                tracing::debug!(claimed = %client_id, "Cursor report for another id, filing under connection id");
            }
            if let Emission::Emitted(offset) = cursor_throttle.try_emit(offset) {
                manager.write().await.move_cursor(origin.room, origin.client_id, offset)?;
            }
        }
    }
    Ok(())
}

/// Release a coalesced cursor report whose window has passed
pub async fn flush_cursor<C: Clock>(
    origin: &Origin<'_>,
    manager: &SharedRoomManager,
    cursor_throttle: &mut Throttle<usize, C>,
) -> Result<(), RoomError> {
    if let Some(offset) = cursor_throttle.poll() {
        manager.write().await.move_cursor(origin.room, origin.client_id, offset)?;
    }
    Ok(())
}
