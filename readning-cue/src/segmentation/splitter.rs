//! Segment splitter
//!
//! Cuts arbitrarily long text into windows small enough for the phase
//! detector. Cuts prefer sentence ends, but the boundary search only scans the
//! tail of each window (plus a small lookahead) so long texts stay cheap to
//! split.

use super::text::{advance_chars, char_len, retreat_chars, sentence_ends};
use readning_common::config::{PipelineSettings, WindowMode};
use serde::{Deserialize, Serialize};

/// Contiguous slice of the source text submitted to phase detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextWindow {
    pub text: String,
    /// Byte offset of `text` within the source
    pub start_offset: usize,
}

/// Non-overlapping logical page produced by sliding-window paging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPage {
    /// 1-based
    pub page_number: u32,
    pub start_offset: usize,
    pub end_offset: usize,
    /// Page text plus trailing context, for analysis only
    pub analysis_text: String,
}

impl TextPage {
    /// The page's own text, without the lookahead
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start_offset..self.end_offset]
    }

    /// Window handed to the phase detector for this page
    pub fn window(&self) -> TextWindow {
        TextWindow {
            text: self.analysis_text.clone(),
            start_offset: self.start_offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitOptions {
    /// Window size cap in characters
    pub max_size: usize,
    /// Characters shared by consecutive windows (lookahead length in paging mode)
    pub overlap: usize,
    /// Fraction of the window skipped before the sentence search starts
    pub search_ratio: f64,
    /// Characters past the raw cut visible to the sentence segmenter
    pub lookahead: usize,
}

impl From<&PipelineSettings> for SplitOptions {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            max_size: settings.max_segment_size,
            overlap: settings.overlap_size,
            search_ratio: settings.sentence_search_ratio,
            lookahead: settings.sentence_lookahead,
        }
    }
}

/// Split `text` into overlapping windows of at most `max_size` characters.
///
/// Text that already fits comes back as a single window at offset 0. Every
/// subsequent window starts `overlap` characters before the previous cut, but
/// always at least one character after the previous start.
pub fn split(text: &str, options: &SplitOptions) -> Vec<TextWindow> {
    let max_size = options.max_size.max(1);

    if char_len(text) <= max_size {
        return vec![TextWindow {
            text: text.to_string(),
            start_offset: 0,
        }];
    }

    let mut windows = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let raw_end = advance_chars(text, pos, max_size);
        let cut = if raw_end < text.len() {
            find_cut(text, pos, raw_end, options)
        } else {
            raw_end
        };

        windows.push(TextWindow {
            text: text[pos..cut].to_string(),
            start_offset: pos,
        });

        if cut >= text.len() {
            break;
        }

        let min_next = advance_chars(text, pos, 1);
        pos = retreat_chars(text, cut, options.overlap).max(min_next);
    }

    tracing::debug!(
        text_chars = char_len(text),
        windows = windows.len(),
        "Split text into analysis windows"
    );
    windows
}

/// Split `text` into non-overlapping pages of at most `max_size` characters.
///
/// Page boundaries follow the same sentence-aware cut as [`split`], but the
/// next page starts exactly where the previous one ended. Each page carries
/// `overlap` characters of the following text in `analysis_text` only.
pub fn split_pages(text: &str, options: &SplitOptions) -> Vec<TextPage> {
    let max_size = options.max_size.max(1);
    let mut pages = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let raw_end = advance_chars(text, pos, max_size);
        let cut = if raw_end < text.len() {
            find_cut(text, pos, raw_end, options)
        } else {
            raw_end
        };
        let analysis_end = advance_chars(text, cut, options.overlap);

        pages.push(TextPage {
            page_number: pages.len() as u32 + 1,
            start_offset: pos,
            end_offset: cut,
            analysis_text: text[pos..analysis_end].to_string(),
        });

        pos = cut;
    }

    pages
}

/// Analysis windows for `text` according to the configured mode
pub fn windows_for(text: &str, options: &SplitOptions, mode: WindowMode) -> Vec<TextWindow> {
    match mode {
        WindowMode::Overlapping => split(text, options),
        WindowMode::Paged => split_pages(text, options)
            .iter()
            .map(TextPage::window)
            .collect(),
    }
}

/// Latest sentence end in `(pos, raw_end]`, searching only from
/// `pos + max_size * search_ratio` to `raw_end + lookahead`. Falls back to
/// `raw_end`.
fn find_cut(text: &str, pos: usize, raw_end: usize, options: &SplitOptions) -> usize {
    let skip = (options.max_size as f64 * options.search_ratio) as usize;
    let search_start = advance_chars(text, pos, skip).min(raw_end);
    let search_end = advance_chars(text, raw_end, options.lookahead);
    let region = &text[search_start..search_end];

    for end in sentence_ends(region).into_iter().rev() {
        let absolute = search_start + end;

        // The region's last "sentence" may just be where the region was cut
        if absolute == search_end && search_end < text.len() {
            continue;
        }

        if absolute > pos && absolute <= raw_end {
            return absolute;
        }
    }

    raw_end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(max_size: usize, overlap: usize) -> SplitOptions {
        SplitOptions {
            max_size,
            overlap,
            search_ratio: 0.8,
            lookahead: 20,
        }
    }

    fn sample_text(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Sentence number {:03} ends here. ", i))
            .collect()
    }

    #[test]
    fn test_short_text_is_single_window() {
        let text = "a".repeat(50);
        let windows = split(&text, &options(2000, 200));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_offset, 0);
        assert_eq!(windows[0].text, text);
    }

    #[test]
    fn test_windows_respect_size_and_overlap() {
        let text = sample_text(60);
        let opts = options(300, 40);
        let windows = split(&text, &opts);

        assert!(windows.len() > 1);
        for pair in windows.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(b.start_offset > a.start_offset);
            // consecutive windows share text
            assert!(b.start_offset < a.start_offset + a.text.len());
        }
        for window in &windows {
            assert!(char_len(&window.text) <= 300);
            assert_eq!(&text[window.start_offset..window.start_offset + window.text.len()], window.text);
        }
        let last = windows.last().unwrap();
        assert_eq!(last.start_offset + last.text.len(), text.len());
    }

    #[test]
    fn test_cut_lands_on_sentence_end() {
        let text = sample_text(60);
        let windows = split(&text, &options(300, 40));
        for window in &windows[..windows.len() - 1] {
            assert!(window.text.ends_with(". "), "window ended mid sentence: {:?}", window.text);
        }
    }

    #[test]
    fn test_no_boundary_falls_back_to_raw_cut() {
        let text = "x".repeat(1000);
        let windows = split(&text, &options(300, 50));
        assert_eq!(windows[0].text.len(), 300);
        assert_eq!(windows[1].start_offset, 250);
    }

    #[test]
    fn test_overlap_not_smaller_than_window_still_advances() {
        let text = "y".repeat(40);
        let windows = split(&text, &options(10, 25));
        assert!(windows.len() > 1);
        for pair in windows.windows(2) {
            assert!(pair[1].start_offset > pair[0].start_offset);
        }
        let last = windows.last().unwrap();
        assert_eq!(last.start_offset + last.text.len(), text.len());
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let text = "감정이 바뀌는 순간이다. ".repeat(40);
        let windows = split(&text, &options(100, 10));
        for window in &windows {
            assert!(text.is_char_boundary(window.start_offset));
            assert!(char_len(&window.text) <= 100);
        }
    }

    #[test]
    fn test_pages_do_not_overlap() {
        let text = sample_text(60);
        let pages = split_pages(&text, &options(300, 40));

        assert!(pages.len() > 1);
        assert_eq!(pages[0].start_offset, 0);
        for pair in pages.windows(2) {
            assert_eq!(pair[0].end_offset, pair[1].start_offset);
            assert_eq!(pair[1].page_number, pair[0].page_number + 1);
        }
        assert_eq!(pages.last().unwrap().end_offset, text.len());

        let first = &pages[0];
        assert!(first.analysis_text.starts_with(first.text(&text)));
        assert_eq!(char_len(&first.analysis_text), char_len(first.text(&text)) + 40);
    }

    #[test]
    fn test_paged_mode_windows_start_at_page_offsets() {
        let text = sample_text(30);
        let opts = options(300, 40);
        let windows = windows_for(&text, &opts, WindowMode::Paged);
        let pages = split_pages(&text, &opts);
        assert_eq!(windows.len(), pages.len());
        assert_eq!(windows[1].start_offset, pages[1].start_offset);
    }
}
