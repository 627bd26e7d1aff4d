//! Diff-based reconciliation
//!
//! The incoming text is authoritative: the merge result always equals it.
//! What the diff buys is caret stability. Replaying the same edit script
//! against the local caret keeps it next to the character it was adjacent
//! to, instead of at a fixed numeric position.

use similar::{DiffTag, TextDiff};

use crate::offset::AbsoluteOffset;
use crate::text::char_len;

/// One step of a character-level edit script over the old text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Keep this many characters
    Equal(usize),
    /// Drop this many characters
    Delete(usize),
    /// Insert text at the current position
    Insert(String),
}

/// Edit script turning one text into another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    edits: Vec<Edit>,
}

impl Patch {
    /// Character-level Myers diff from `old` to `new`
    pub fn between(old: &str, new: &str) -> Self {
        let diff = TextDiff::from_chars(old, new);
        let new_chars: Vec<char> = new.chars().collect();
        let mut edits = Vec::new();

        for op in diff.ops() {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            match tag {
                DiffTag::Equal => edits.push(Edit::Equal(old_range.len())),
                DiffTag::Delete => edits.push(Edit::Delete(old_range.len())),
                DiffTag::Insert => {
                    edits.push(Edit::Insert(new_chars[new_range].iter().collect()));
                }
                DiffTag::Replace => {
                    edits.push(Edit::Delete(old_range.len()));
                    edits.push(Edit::Insert(new_chars[new_range].iter().collect()));
                }
            }
        }

        Self { edits }
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// True when the script changes nothing
    pub fn is_identity(&self) -> bool {
        self.edits.iter().all(|edit| matches!(edit, Edit::Equal(_)))
    }

    /// Run the script over `old`
    pub fn apply(&self, old: &str) -> String {
        let mut chars = old.chars();
        let mut out = String::with_capacity(old.len());
        for edit in &self.edits {
            match edit {
                Edit::Equal(len) => out.extend(chars.by_ref().take(*len)),
                Edit::Delete(len) => chars.by_ref().take(*len).for_each(drop),
                Edit::Insert(text) => out.push_str(text),
            }
        }
        out
    }

    /// Where a caret at `offset` in the old text ends up in the new text
    ///
    /// Deletions before the caret pull it left, never past the deletion's
    /// start. Insertions at or before the caret push it right.
    pub fn transform_offset(&self, offset: AbsoluteOffset) -> AbsoluteOffset {
        let mut old_pos = 0;
        let mut adjusted = offset;

        for edit in &self.edits {
            match edit {
                Edit::Equal(len) => old_pos += len,
                Edit::Delete(len) => {
                    if old_pos < offset {
                        adjusted = adjusted.saturating_sub((*len).min(offset - old_pos));
                    }
                    old_pos += len;
                }
                Edit::Insert(text) => {
                    if old_pos <= offset {
                        adjusted += char_len(text);
                    }
                }
            }
        }

        adjusted
    }
}

/// Result of merging an authoritative text into local state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub merged_text: String,
    pub adjusted_offset: AbsoluteOffset,
}

/// Merge `incoming` over `local` and carry the local caret across
///
/// `0 <= adjusted_offset <= len(merged_text)` always holds; a local offset
/// past the end of `local` is clamped first.
pub fn reconcile(local: &str, incoming: &str, local_offset: AbsoluteOffset) -> Reconciled {
    let local_offset = local_offset.min(char_len(local));

    if local == incoming {
        return Reconciled {
            merged_text: local.to_string(),
            adjusted_offset: local_offset,
        };
    }

    let patch = Patch::between(local, incoming);
    let merged_text = patch.apply(local);
    debug_assert_eq!(merged_text, incoming);

    let adjusted_offset = patch.transform_offset(local_offset).min(char_len(&merged_text));

    tracing::trace!(
        edits = patch.edits().len(),
        from = local_offset,
        to = adjusted_offset,
        "reconciled incoming text"
    );

    Reconciled {
        merged_text,
        adjusted_offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_before_caret_shifts_right() {
        let r = reconcile("hello world", "hello, world", 11);
        assert_eq!(r.merged_text, "hello, world");
        assert_eq!(r.adjusted_offset, 12);
    }

    #[test]
    fn deletion_before_caret_shifts_left() {
        let r = reconcile("hello world", "hello", 11);
        assert_eq!(r.merged_text, "hello");
        assert_eq!(r.adjusted_offset, 5);
    }

    #[test]
    fn edits_after_caret_leave_it_alone() {
        let r = reconcile("hello world", "hello world!!!", 3);
        assert_eq!(r.adjusted_offset, 3);
        let r = reconcile("hello world", "hello", 2);
        assert_eq!(r.adjusted_offset, 2);
    }

    #[test]
    fn caret_inside_deleted_span_lands_on_its_start() {
        // "brown " removed, caret was between 'r' and 'o'
        let r = reconcile("the brown fox", "the fox", 6);
        assert_eq!(r.merged_text, "the fox");
        assert_eq!(r.adjusted_offset, 4);
    }

    #[test]
    fn insertion_exactly_at_caret_pushes_it() {
        let r = reconcile("ab", "aXb", 1);
        assert_eq!(r.adjusted_offset, 2);
    }

    #[test]
    fn identical_text_is_a_no_op() {
        let r = reconcile("same", "same", 2);
        assert_eq!(r.merged_text, "same");
        assert_eq!(r.adjusted_offset, 2);
        assert!(Patch::between("same", "same").is_identity());
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let r = reconcile("né b", "né, b", 4);
        assert_eq!(r.merged_text, "né, b");
        assert_eq!(r.adjusted_offset, 5);
    }

    #[test]
    fn out_of_range_local_offset_clamps() {
        let r = reconcile("abc", "abcd", 50);
        assert_eq!(r.adjusted_offset, 4);
        let r = reconcile("abc", "abc", 50);
        assert_eq!(r.adjusted_offset, 3);
    }

    #[test]
    fn full_replacement_stays_in_bounds() {
        let r = reconcile("aaaa", "zz", 4);
        assert_eq!(r.merged_text, "zz");
        assert!(r.adjusted_offset <= 2);
    }

    #[test]
    fn patch_apply_reproduces_target() {
        let patch = Patch::between("# Title\n- one\n- two", "# Title!\n- one\n- 2\n- three");
        assert_eq!(
            patch.apply("# Title\n- one\n- two"),
            "# Title!\n- one\n- 2\n- three"
        );
        assert!(!patch.is_identity());
    }
}
