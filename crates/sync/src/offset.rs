//! Caret anchor <-> absolute offset mapping
//!
//! An absolute offset counts one unit per character and exactly one unit
//! per break segment, independent of how the tree splits its text.
//!
//! Editors report the caret in two regimes. When the anchor is a text node
//! the index is a character offset inside it. When the anchor is a non-text
//! node (an empty line, the paragraph itself) the index is a traversal depth:
//! the number of child segments before the caret, not a character count.
//! [`Anchor`] keeps the two apart so the mapper can branch on it.

use crate::segment::{NodeKey, Segment, SegmentSource};
use crate::text::char_len;

/// Character index into the flattened document
pub type AbsoluteOffset = usize;

/// Caret position as the editable tree reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Caret inside a text segment; `offset` counts characters into it
    Text { node: NodeKey, offset: usize },
    /// Caret on a non-text node; `depth` counts segments before it
    Element { depth: usize },
}

/// Absolute offset of a caret anchor
///
/// Returns `None` when the tree is unavailable or the anchor names a node
/// that is no longer in it. Callers skip the update in that case.
pub fn to_offset<S: SegmentSource + ?Sized>(tree: &S, anchor: Anchor) -> Option<AbsoluteOffset> {
    let segments = tree.segments()?;
    match anchor {
        Anchor::Text { node, offset } => {
            let mut before = 0;
            for segment in segments {
                match segment {
                    Segment::Text { key, text } if key == node => {
                        return Some(before + offset.min(char_len(&text)));
                    }
                    other => before += other.len(),
                }
            }
            tracing::trace!(node, "caret anchor is not in the tree");
            None
        }
        // A lone empty line has no segments at all, so any depth maps to 0
        Anchor::Element { depth } => Some(segments.take(depth).map(|s| s.len()).sum()),
    }
}

/// Caret anchor for an absolute offset
///
/// Offsets past the end clamp to the end of the last segment.
pub fn to_anchor<S: SegmentSource + ?Sized>(tree: &S, offset: AbsoluteOffset) -> Option<Anchor> {
    let mut remaining = offset;
    let mut depth = 0;
    let mut last_text: Option<(NodeKey, usize)> = None;

    for segment in tree.segments()? {
        match segment {
            Segment::Text { key, text } => {
                let len = char_len(&text);
                if remaining <= len {
                    return Some(Anchor::Text {
                        node: key,
                        offset: remaining,
                    });
                }
                remaining -= len;
                last_text = Some((key, len));
            }
            Segment::Break { .. } => {
                if remaining == 0 {
                    return Some(Anchor::Element { depth });
                }
                remaining -= 1;
                last_text = None;
            }
        }
        depth += 1;
    }

    Some(match last_text {
        Some((node, len)) => Anchor::Text { node, offset: len },
        None => Anchor::Element { depth },
    })
}

/// Length of the flattened document
pub fn document_len<S: SegmentSource + ?Sized>(tree: &S) -> Option<usize> {
    Some(tree.segments()?.map(|s| s.len()).sum())
}
