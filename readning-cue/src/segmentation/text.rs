//! Character/byte offset helpers and sentence boundaries

use unicode_segmentation::UnicodeSegmentation;

/// Length in characters
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset reached by moving `count` characters forward from `from`,
/// clamped to the end of `text`.
pub fn advance_chars(text: &str, from: usize, count: usize) -> usize {
    match text[from..].char_indices().nth(count) {
        Some((idx, _)) => from + idx,
        None => text.len(),
    }
}

/// Byte offset reached by moving `count` characters back from `from`,
/// clamped to 0.
pub fn retreat_chars(text: &str, from: usize, count: usize) -> usize {
    if count == 0 {
        return from;
    }
    match text[..from].char_indices().rev().nth(count - 1) {
        Some((idx, _)) => idx,
        None => 0,
    }
}

/// First `count` characters of `text`
pub fn truncate_chars(text: &str, count: usize) -> &str {
    &text[..advance_chars(text, 0, count)]
}

/// Byte offset of the middle character of `text`
pub fn char_midpoint(text: &str) -> usize {
    advance_chars(text, 0, char_len(text) / 2)
}

/// Byte offsets at which a sentence ends (exclusive), in ascending order.
///
/// Trailing whitespace belongs to the sentence it follows. The final entry is
/// always `text.len()` for non-empty text, even when the text stops mid
/// sentence.
pub fn sentence_ends(text: &str) -> Vec<usize> {
    text.split_sentence_bound_indices()
        .map(|(idx, sentence)| idx + sentence.len())
        .collect()
}

/// Byte range of `text[start..end]` once surrounding whitespace is removed
pub fn trimmed_range(text: &str, start: usize, end: usize) -> (usize, usize) {
    let slice = &text[start..end];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    if leading == slice.len() {
        return (start, start);
    }
    (start + leading, end - trailing)
}
