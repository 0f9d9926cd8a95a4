//! Position reconciler
//!
//! Detectors return quotations, not offsets. Each anchor is searched for in
//! the window it came from (exact first, then its first 30 characters, then
//! both again with every quote mark folded to `'`) and the match is
//! translated into an absolute offset in the source text.

use super::EmotionalPhase;
use crate::segmentation::text::{advance_chars, truncate_chars};
use crate::segmentation::TextWindow;
use std::cmp::Ordering;

/// Characters of the anchor used for the fuzzy retry
pub const FUZZY_PREFIX_CHARS: usize = 30;

/// Byte offset of `anchor` within `window_text`, exact match first, then the
/// anchor's leading characters.
pub fn locate_anchor(window_text: &str, anchor: &str) -> Option<usize> {
    let anchor = anchor.trim();
    if anchor.is_empty() {
        return None;
    }

    if let Some(idx) = window_text.find(anchor) {
        return Some(idx);
    }

    let prefix = truncate_chars(anchor, FUZZY_PREFIX_CHARS);
    if let Some(idx) = window_text.find(prefix) {
        tracing::debug!(position = idx, "Anchor located by prefix match");
        return Some(idx);
    }

    locate_quote_folded(window_text, anchor)
}

/// Straight and typographic quotes all become `'`
fn fold_quote(c: char) -> char {
    match c {
        '"' | '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2018}' | '\u{2019}' | '\u{201A}'
        | '\u{201B}' => '\'',
        other => other,
    }
}

/// Exact then prefix search with quotes folded on both sides.
///
/// Folding is one char for one char, so a hit's char index in the folded
/// window is its char index in the real one.
fn locate_quote_folded(window_text: &str, anchor: &str) -> Option<usize> {
    let window: String = window_text.chars().map(fold_quote).collect();
    let anchor: String = anchor.chars().map(fold_quote).collect();

    let folded_idx = window
        .find(&anchor)
        .or_else(|| window.find(truncate_chars(&anchor, FUZZY_PREFIX_CHARS)))?;

    let char_idx = window[..folded_idx].chars().count();
    let idx = advance_chars(window_text, 0, char_idx);
    tracing::debug!(position = idx, "Anchor located after folding quotes");
    Some(idx)
}

/// Resolve each phase's absolute position within `window`, then order them.
///
/// Unlocated phases keep `absolute_position = None` and end up at the tail.
pub fn reconcile(window: &TextWindow, phases: Vec<EmotionalPhase>) -> Vec<EmotionalPhase> {
    let located: Vec<EmotionalPhase> = phases
        .into_iter()
        .map(|mut phase| {
            phase.absolute_position = locate_anchor(&window.text, &phase.anchor_text)
                .map(|idx| window.start_offset + idx);

            if phase.absolute_position.is_none() {
                tracing::warn!(
                    window_offset = window.start_offset,
                    anchor = %truncate_chars(&phase.anchor_text, 50),
                    "Anchor not found in window"
                );
            }
            phase
        })
        .collect();

    order_phases(located)
}

/// Stable sort by position with unlocated phases last.
///
/// Phases reconciled to the same offset (the same transition seen through two
/// overlapping windows) collapse into one, keeping the most significant.
/// Located positions in the result are strictly increasing.
pub fn order_phases(mut phases: Vec<EmotionalPhase>) -> Vec<EmotionalPhase> {
    phases.sort_by(|a, b| match (a.absolute_position, b.absolute_position) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let mut ordered: Vec<EmotionalPhase> = Vec::with_capacity(phases.len());
    for phase in phases {
        if let Some(last) = ordered.last_mut() {
            if phase.absolute_position.is_some() && last.absolute_position == phase.absolute_position {
                if phase.significance > last.significance {
                    *last = phase;
                }
                continue;
            }
        }
        ordered.push(phase);
    }
    ordered
}
