//! Room management
//!
//! A room is one collaborative document: its canonical text, its cursor
//! registry, and the connections editing it. Rooms are created when the
//! first connection joins and dropped when the last one leaves.
//!
//! Every mutation broadcasts while the caller holds the manager's write
//! lock, so all members observe events in receipt order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use mdcollab_protocol::{ClientCursor, ConnectionId, RoomId, ServerMessage};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use crate::collaboration::CursorRegistry;
use crate::config::RoomConfig;
use crate::document::DocumentStore;

/// Manager shared between the connection tasks and the REST API
pub type SharedRoomManager = Arc<RwLock<RoomManager>>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room limit reached ({max} rooms)")]
    Full { max: usize },
    #[error("room {0} not found")]
    NotFound(RoomId),
    #[error("connection {conn} is not a member of room {room}")]
    NotMember { room: RoomId, conn: ConnectionId },
}

/// Broadcast to every member's sender task
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// Canonical text replaced by `from`
    Text { from: ConnectionId, text: String },
    /// Registry changed because of `from`
    Cursors {
        from: ConnectionId,
        cursors: Vec<ClientCursor>,
    },
}

impl RoomEvent {
    /// Message `recipient` should get, if any
    ///
    /// The originator never receives its own event.
    pub fn for_recipient(&self, recipient: &str) -> Option<ServerMessage> {
        match self {
            Self::Text { from, text } => (from != recipient).then(|| ServerMessage::ReceiveText { text: text.clone() }),
            Self::Cursors { from, cursors } => (from != recipient).then(|| ServerMessage::UpdateCursors {
                cursors: mdcollab_protocol::without_client(cursors, recipient),
            }),
        }
    }
}

#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    document: DocumentStore,
    cursors: CursorRegistry,
    members: HashSet<ConnectionId>,
    events: broadcast::Sender<RoomEvent>,
    created_at: Instant,
    pub last_active: Instant,
}

impl Room {
    pub fn new(id: RoomId, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        let now = Instant::now();
        Self {
            id,
            document: DocumentStore::new(),
            cursors: CursorRegistry::new(),
            members: HashSet::new(),
            events,
            created_at: now,
            last_active: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    pub fn is_member(&self, conn: &str) -> bool {
        self.members.contains(conn)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub const fn document(&self) -> &DocumentStore {
        &self.document
    }

    pub const fn cursors(&self) -> &CursorRegistry {
        &self.cursors
    }

    /// Initial message for `conn`
    pub fn load_document(&self, conn: &str) -> ServerMessage {
        ServerMessage::LoadDocument {
            client_id: conn.to_string(),
            text: self.document.load().to_string(),
            cursors: self.cursors.snapshot_for(conn),
        }
    }

    /// Registry as `conn` should see it
    pub fn cursor_update(&self, conn: &str) -> ServerMessage {
        ServerMessage::UpdateCursors {
            cursors: self.cursors.snapshot_for(conn),
        }
    }

    fn broadcast(&self, event: RoomEvent) {
        // No receivers just means nobody else is listening
        let _ = self.events.send(event);
    }

    fn apply_text(&mut self, from: &str, text: String) -> u64 {
        let text = self.document.apply(text).to_string();
        self.touch();
        self.broadcast(RoomEvent::Text {
            from: from.to_string(),
            text,
        });
        self.document.revision()
    }

    fn move_cursor(&mut self, from: &str, offset: usize) {
        self.cursors.upsert(from, offset);
        self.touch();
        self.broadcast(RoomEvent::Cursors {
            from: from.to_string(),
            cursors: self.cursors.snapshot(),
        });
    }

    fn remove_member(&mut self, conn: &str) {
        self.members.remove(conn);
        if self.cursors.remove(conn) {
            self.broadcast(RoomEvent::Cursors {
                from: conn.to_string(),
                cursors: self.cursors.snapshot(),
            });
        }
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id.clone(),
            members: self.members.len(),
            revision: self.document.revision(),
            length: self.document.len(),
            idle_secs: self.last_active.elapsed().as_secs(),
            age_secs: self.created_at.elapsed().as_secs(),
        }
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id.clone(),
            text: self.document.load().to_string(),
            revision: self.document.revision(),
            cursors: self.cursors.snapshot(),
        }
    }
}

/// Room summary for API responses
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: RoomId,
    pub members: usize,
    pub revision: u64,
    pub length: usize,
    pub idle_secs: u64,
    pub age_secs: u64,
}

/// Full room state for API responses
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub text: String,
    pub revision: u64,
    pub cursors: Vec<ClientCursor>,
}

/// What a connection gets on joining
pub struct Joined {
    pub load: ServerMessage,
    pub events: broadcast::Receiver<RoomEvent>,
}

#[derive(Debug)]
pub struct RoomManager {
    rooms: HashMap<RoomId, Room>,
    max_rooms: usize,
    channel_capacity: usize,
}

impl RoomManager {
    pub fn new(config: &RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            max_rooms: config.max_rooms,
            channel_capacity: config.channel_capacity,
        }
    }

    pub fn shared(config: &RoomConfig) -> SharedRoomManager {
        Arc::new(RwLock::new(Self::new(config)))
    }

    /// Add `conn` to `room`, creating the room on first join
    pub fn join(&mut self, room: &str, conn: &str) -> Result<Joined, RoomError> {
        if !self.rooms.contains_key(room) && self.rooms.len() >= self.max_rooms {
            tracing::warn!(room = %room, max = self.max_rooms, "Room limit reached");
            return Err(RoomError::Full { max: self.max_rooms });
        }
        let capacity = self.channel_capacity;
        let entry = self.rooms.entry(room.to_string()).or_insert_with(|| {
            tracing::info!(room = %room, "Room created");
            Room::new(room.to_string(), capacity)
        });

        entry.members.insert(conn.to_string());
        entry.touch();
        // Subscribe before building the snapshot so nothing falls in between
        let events = entry.subscribe();
        let load = entry.load_document(conn);
        tracing::info!(room = %room, client_id = %conn, members = entry.member_count(), "Joined room");
        Ok(Joined { load, events })
    }

    /// Remove `conn` and its cursor; drops the room when it empties
    ///
    /// Returns true if the room was disposed.
    pub fn leave(&mut self, room: &str, conn: &str) -> bool {
        let Some(entry) = self.rooms.get_mut(room) else {
            return false;
        };
        entry.remove_member(conn);
        tracing::info!(room = %room, client_id = %conn, members = entry.member_count(), "Left room");

        if entry.member_count() == 0 {
            self.rooms.remove(room);
            tracing::info!(room = %room, "Room disposed");
            return true;
        }
        false
    }

    /// Store `text` as canonical and rebroadcast it; returns the new revision
    pub fn apply_text(&mut self, room: &str, conn: &str, text: String) -> Result<u64, RoomError> {
        let entry = self.member_room(room, conn)?;
        Ok(entry.apply_text(conn, text))
    }

    /// Upsert the cursor of `conn` and rebroadcast the registry
    pub fn move_cursor(&mut self, room: &str, conn: &str, offset: usize) -> Result<(), RoomError> {
        let entry = self.member_room(room, conn)?;
        entry.move_cursor(conn, offset);
        Ok(())
    }

    fn member_room(&mut self, room: &str, conn: &str) -> Result<&mut Room, RoomError> {
        let entry = self
            .rooms
            .get_mut(room)
            .ok_or_else(|| RoomError::NotFound(room.to_string()))?;
        if !entry.is_member(conn) {
            return Err(RoomError::NotMember {
                room: room.to_string(),
                conn: conn.to_string(),
            });
        }
        Ok(entry)
    }

    /// Full state for a member whose event stream lagged
    pub fn resync(&self, room: &str, conn: &str) -> Option<[ServerMessage; 2]> {
        let entry = self.rooms.get(room).filter(|r| r.is_member(conn))?;
        Some([entry.load_document(conn), entry.cursor_update(conn)])
    }

    pub fn has_room(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Summaries of all rooms, sorted by id
    pub fn list(&self) -> Vec<RoomInfo> {
        let mut rooms: Vec<RoomInfo> = self.rooms.values().map(Room::info).collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }

    pub fn snapshot(&self, room: &str) -> Option<RoomSnapshot> {
        self.rooms.get(room).map(Room::snapshot)
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(&RoomConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(max_rooms: usize) -> RoomManager {
        RoomManager::new(&RoomConfig {
            max_rooms,
            ..RoomConfig::default()
        })
    }

    #[test]
    fn first_join_creates_room_with_empty_text() {
        let mut mgr = manager(4);
        let joined = mgr.join("notes", "a").unwrap();
        assert_eq!(
            joined.load,
            ServerMessage::LoadDocument {
                client_id: "a".into(),
                text: String::new(),
                cursors: vec![],
            }
        );
        assert!(mgr.has_room("notes"));
    }

    #[test]
    fn last_leave_disposes_room() {
        let mut mgr = manager(4);
        mgr.join("r", "a").unwrap();
        mgr.join("r", "b").unwrap();
        assert!(!mgr.leave("r", "a"));
        assert!(mgr.leave("r", "b"));
        assert_eq!(mgr.room_count(), 0);
        assert!(!mgr.leave("r", "b"));
    }

    #[test]
    fn room_limit_is_enforced_for_new_rooms_only() {
        let mut mgr = manager(1);
        mgr.join("one", "a").unwrap();
        assert_eq!(mgr.join("two", "b").err(), Some(RoomError::Full { max: 1 }));
        assert!(mgr.join("one", "c").is_ok());
    }

    #[test]
    fn text_converges_to_last_apply() {
        let mut mgr = manager(4);
        mgr.join("r", "a").unwrap();
        mgr.join("r", "b").unwrap();
        mgr.apply_text("r", "a", "one".into()).unwrap();
        mgr.apply_text("r", "b", "two".into()).unwrap();
        let rev = mgr.apply_text("r", "a", "three".into()).unwrap();
        assert_eq!(rev, 3);
        assert_eq!(mgr.snapshot("r").unwrap().text, "three");

        // late joiner sees the canonical text
        let joined = mgr.join("r", "c").unwrap();
        assert!(matches!(joined.load, ServerMessage::LoadDocument { ref text, .. } if text == "three"));
    }

    #[test]
    fn non_members_cannot_write() {
        let mut mgr = manager(4);
        mgr.join("r", "a").unwrap();
        assert!(matches!(
            mgr.apply_text("r", "zz", "x".into()),
            Err(RoomError::NotMember { .. })
        ));
        assert_eq!(
            mgr.move_cursor("nope", "a", 1),
            Err(RoomError::NotFound("nope".into()))
        );
    }

    #[test]
    fn events_skip_originator() {
        let mut mgr = manager(4);
        let mut a = mgr.join("r", "a").unwrap().events;
        mgr.join("r", "b").unwrap();

        mgr.apply_text("r", "b", "hello".into()).unwrap();
        mgr.apply_text("r", "a", "mine".into()).unwrap();

        let first = a.try_recv().unwrap();
        assert_eq!(
            first.for_recipient("a"),
            Some(ServerMessage::ReceiveText { text: "hello".into() })
        );
        let second = a.try_recv().unwrap();
        assert_eq!(second.for_recipient("a"), None);
    }

    #[test]
    fn cursor_event_is_filtered_per_recipient() {
        let mut mgr = manager(4);
        let mut a = mgr.join("r", "a").unwrap().events;
        mgr.join("r", "b").unwrap();
        mgr.move_cursor("r", "a", 2).unwrap();
        mgr.move_cursor("r", "b", 4).unwrap();

        let _own = a.try_recv().unwrap();
        let event = a.try_recv().unwrap();
        assert_eq!(
            event.for_recipient("a"),
            Some(ServerMessage::UpdateCursors {
                cursors: vec![ClientCursor::new("b", 4)]
            })
        );
    }

    #[test]
    fn disconnect_removes_cursor_and_notifies() {
        let mut mgr = manager(4);
        let mut a = mgr.join("r", "a").unwrap().events;
        mgr.join("r", "b").unwrap();
        mgr.move_cursor("r", "a", 1).unwrap();
        mgr.move_cursor("r", "b", 3).unwrap();
        while a.try_recv().is_ok() {}

        mgr.leave("r", "b");
        let event = a.try_recv().unwrap();
        assert_eq!(
            event.for_recipient("a"),
            Some(ServerMessage::UpdateCursors { cursors: vec![] })
        );
        assert_eq!(
            mgr.snapshot("r").unwrap().cursors,
            vec![ClientCursor::new("a", 1)]
        );
    }

    #[test]
    fn resync_only_for_members() {
        let mut mgr = manager(4);
        mgr.join("r", "a").unwrap();
        assert!(mgr.resync("r", "a").is_some());
        assert!(mgr.resync("r", "ghost").is_none());
    }

    #[test]
    fn list_is_sorted() {
        let mut mgr = manager(4);
        mgr.join("b", "1").unwrap();
        mgr.join("a", "2").unwrap();
        let ids: Vec<_> = mgr.list().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn fresh_rooms_report_their_age() {
        let mut mgr = manager(4);
        mgr.join("r", "a").unwrap();
        let info = mgr.list().remove(0);
        assert_eq!(info.age_secs, 0);
        assert!(info.age_secs >= info.idle_secs);
        assert_eq!((info.members, info.revision, info.length), (1, 0, 0));
    }
}
