//! Page mapper

use super::TextChunk;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Chunk index range of one page (1-based, inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpan {
    pub start_index: usize,
    pub end_index: usize,
    pub count: usize,
}

impl PageSpan {
    /// 0-based slice range into the chunk list
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start_index - 1..self.end_index
    }
}

/// Group chunks into pages of `chunks_per_page` and stamp each chunk with
/// its page number. The last page may be partial.
pub fn paginate(chunks: &mut [TextChunk], chunks_per_page: usize) -> BTreeMap<u32, PageSpan> {
    let per_page = chunks_per_page.max(1);
    let mut pages = BTreeMap::new();

    for (i, chunk) in chunks.iter_mut().enumerate() {
        let page = (i / per_page) as u32 + 1;
        chunk.page = Some(page);

        pages
            .entry(page)
            .and_modify(|span: &mut PageSpan| {
                span.end_index = i + 1;
                span.count += 1;
            })
            .or_insert(PageSpan {
                start_index: i + 1,
                end_index: i + 1,
                count: 1,
            });
    }

    pages
}
