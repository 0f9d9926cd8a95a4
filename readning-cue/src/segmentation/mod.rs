//! Text segmentation
//!
//! Offsets handed around the pipeline are byte offsets into the source text
//! and always fall on char boundaries. Sizes are counted in characters.

pub mod splitter;
pub mod text;

pub use splitter::{split, split_pages, windows_for, SplitOptions, TextPage, TextWindow};
