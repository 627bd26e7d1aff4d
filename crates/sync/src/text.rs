//! Character counting helpers
//!
//! Absolute offsets count Unicode scalar values. Browsers report offsets
//! inside text nodes in UTF-16 code units, so the DOM adapter converts at
//! the boundary.

/// Length in characters
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Convert a UTF-16 code unit offset into a character offset
///
/// An offset that splits a surrogate pair rounds up to the next character.
/// Offsets past the end clamp to the character length.
pub fn utf16_to_char_offset(s: &str, utf16_offset: usize) -> usize {
    let mut units = 0;
    for (index, ch) in s.chars().enumerate() {
        if units >= utf16_offset {
            return index;
        }
        units += ch.len_utf16();
    }
    char_len(s)
}

/// Convert a character offset into a UTF-16 code unit offset
pub fn char_to_utf16_offset(s: &str, char_offset: usize) -> usize {
    s.chars().take(char_offset).map(char::len_utf16).sum()
}
