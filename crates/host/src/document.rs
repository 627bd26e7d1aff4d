//! Canonical document text for one room
//!
//! No validation and no merging: the last applied text wins. The revision
//! counter is informational only.

#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    text: String,
    revision: u64,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current canonical text, as sent to joining clients
    pub fn load(&self) -> &str {
        &self.text
    }

    /// Overwrite the canonical text; returns it for rebroadcast
    pub fn apply(&mut self, text: String) -> &str {
        self.text = text;
        self.revision += 1;
        &self.text
    }

    /// Number of applied updates since creation
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
