//! Chunk assembly and page mapping

pub mod assembler;
pub mod pages;

pub use assembler::{ChunkAssembler, ChunkContext, ChunkStatistics, TextChunk, NEUTRAL_EMOTION};
pub use pages::{paginate, PageSpan};
