//! Flat segment view of an editable tree
//!
//! Rich-text frameworks nest paragraphs, lines and text runs arbitrarily.
//! The engine only needs the leaves in document order: text segments
//! contribute their characters, break segments contribute one newline that
//! no text segment materializes.

use std::borrow::Cow;

use crate::text::char_len;

/// Identity of a tree node, stable until the tree is re-rendered
pub type NodeKey = u64;

/// One leaf of the flattened tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text { key: NodeKey, text: Cow<'a, str> },
    Break { key: NodeKey },
}

impl Segment<'_> {
    /// Contribution to the flattened text, in characters
    pub fn len(&self) -> usize {
        match self {
            Self::Text { text, .. } => char_len(text),
            Self::Break { .. } => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    pub const fn key(&self) -> NodeKey {
        match self {
            Self::Text { key, .. } | Self::Break { key } => *key,
        }
    }
}

/// Segments in document order
pub type Segments<'a> = Box<dyn Iterator<Item = Segment<'a>> + 'a>;

/// Anything that can expose its content as segments
pub trait SegmentSource {
    /// `None` while the tree is detached or mid re-render
    fn segments(&self) -> Option<Segments<'_>>;
}

/// Flattened text of the tree
pub fn flatten<S: SegmentSource + ?Sized>(tree: &S) -> Option<String> {
    let mut out = String::new();
    for segment in tree.segments()? {
        match segment {
            Segment::Text { text, .. } => out.push_str(&text),
            Segment::Break { .. } => out.push('\n'),
        }
    }
    Some(out)
}
