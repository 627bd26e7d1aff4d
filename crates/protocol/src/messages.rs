use serde::{Deserialize, Serialize};

/// Server-assigned identifier of one live connection
pub type ConnectionId = String;

/// Identifier of a collaborative document (room)
pub type RoomId = String;

/// Room joined when the client does not ask for one
pub const DEFAULT_ROOM: &str = "default";

/// Last reported caret of a connected client
///
/// `offset` is an absolute character offset into the flattened document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCursor {
    pub id: ConnectionId,
    pub offset: usize,
}

impl ClientCursor {
    pub fn new(id: impl Into<ConnectionId>, offset: usize) -> Self {
        Self {
            id: id.into(),
            offset,
        }
    }
}

/// Browser -> host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Full local text after an edit
    SendText { text: String },
    /// Local caret moved
    SendCursor { offset: usize, client_id: ConnectionId },
}

/// Host -> browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Sent once per connection: assigned id, canonical text, other cursors
    LoadDocument {
        client_id: ConnectionId,
        text: String,
        cursors: Vec<ClientCursor>,
    },
    /// Another client replaced the canonical text
    ReceiveText { text: String },
    /// Full cursor registry snapshot (recipient's own entry removed)
    UpdateCursors { cursors: Vec<ClientCursor> },
}

impl ServerMessage {
    /// Short name used in log fields
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::LoadDocument { .. } => "load-document",
            Self::ReceiveText { .. } => "receive-text",
            Self::UpdateCursors { .. } => "update-cursors",
        }
    }
}

impl ClientMessage {
    /// Short name used in log fields
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SendText { .. } => "send-text",
            Self::SendCursor { .. } => "send-cursor",
        }
    }
}

/// Drop `own` from a registry snapshot
pub fn without_client(cursors: &[ClientCursor], own: &str) -> Vec<ClientCursor> {
    cursors.iter().filter(|c| c.id != own).cloned().collect()
}
