//! In-memory editable tree
//!
//! Mirrors how a plain-text rich editor partitions content: one text node
//! per non-empty line, one line-break node between lines, and a fresh set of
//! node identities whenever the whole content is replaced.

use std::borrow::Cow;

use crate::client::EditableDocument;
use crate::offset::Anchor;
use crate::segment::{NodeKey, Segment, SegmentSource, Segments};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text { key: NodeKey, text: String },
    Break { key: NodeKey },
}

#[derive(Debug, Clone, Default)]
pub struct LineTree {
    nodes: Vec<Node>,
    next_key: NodeKey,
    caret: Option<Anchor>,
    detached: bool,
}

impl LineTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the canonical partition of `text`
    pub fn from_text(text: &str) -> Self {
        let mut tree = Self::new();
        tree.load(text);
        tree
    }

    fn load(&mut self, text: &str) {
        self.nodes.clear();
        for (index, line) in text.split('\n').enumerate() {
            if index > 0 {
                self.push_break();
            }
            if !line.is_empty() {
                self.push_text(line);
            }
        }
    }

    fn next_key(&mut self) -> NodeKey {
        self.next_key += 1;
        self.next_key
    }

    /// Append a text node; adjacent text nodes are allowed
    pub fn push_text(&mut self, text: &str) -> NodeKey {
        let key = self.next_key();
        self.nodes.push(Node::Text {
            key,
            text: text.to_string(),
        });
        key
    }

    pub fn push_break(&mut self) -> NodeKey {
        let key = self.next_key();
        self.nodes.push(Node::Break { key });
        key
    }

    /// Keys of all text nodes in document order
    pub fn text_keys(&self) -> Vec<NodeKey> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Text { key, .. } => Some(*key),
                Node::Break { .. } => None,
            })
            .collect()
    }

    /// Simulate the tree being unmounted during a re-render
    pub fn set_detached(&mut self, detached: bool) {
        self.detached = detached;
    }

    pub fn segment_count(&self) -> usize {
        self.nodes.len()
    }
}

impl SegmentSource for LineTree {
    fn segments(&self) -> Option<Segments<'_>> {
        if self.detached {
            return None;
        }
        Some(Box::new(self.nodes.iter().map(|node| match node {
            Node::Text { key, text } => Segment::Text {
                key: *key,
                text: Cow::Borrowed(text.as_str()),
            },
            Node::Break { key } => Segment::Break { key: *key },
        })))
    }
}

impl EditableDocument for LineTree {
    fn caret(&self) -> Option<Anchor> {
        if self.detached {
            return None;
        }
        self.caret
    }

    fn replace_text(&mut self, text: &str) {
        self.load(text);
        self.caret = None;
    }

    fn set_caret(&mut self, anchor: Anchor) {
        self.caret = Some(anchor);
    }
}
