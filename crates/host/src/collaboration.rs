//! Cursor registry for multi-user rooms
//!
//! One entry per live connection, keyed by connection id. Broadcast as a
//! full snapshot on every change.

use mdcollab_protocol::{without_client, ClientCursor};

#[derive(Debug, Clone, Default)]
pub struct CursorRegistry {
    cursors: Vec<ClientCursor>,
}

impl CursorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `id`, or append one
    pub fn upsert(&mut self, id: &str, offset: usize) {
        if let Some(cursor) = self.cursors.iter_mut().find(|c| c.id == id) {
            cursor.offset = offset;
        } else {
            self.cursors.push(ClientCursor::new(id, offset));
        }
    }

    /// Remove the entry for `id`; true if there was one
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.cursors.len();
        self.cursors.retain(|c| c.id != id);
        self.cursors.len() != before
    }

    /// Full registry
    pub fn snapshot(&self) -> Vec<ClientCursor> {
        self.cursors.clone()
    }

    /// Registry as `recipient` should see it
    pub fn snapshot_for(&self, recipient: &str) -> Vec<ClientCursor> {
        without_client(&self.cursors, recipient)
    }

    pub fn get(&self, id: &str) -> Option<usize> {
        self.cursors.iter().find(|c| c.id == id).map(|c| c.offset)
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}
