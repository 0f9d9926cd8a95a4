//! Chunk assembler
//!
//! Cuts the source text at surviving phase positions in one left-to-right
//! pass. Spans shorter than `min_size` are not cut (the next boundary absorbs
//! them), spans longer than `max_size` are re-split at sentence boundaries,
//! and an undersized trailing span is appended to the previous chunk. Every
//! character of the trimmed source ends up in exactly one chunk.

use crate::analysis::EmotionalPhase;
use crate::segmentation::text::{advance_chars, char_len, char_midpoint, sentence_ends, trimmed_range};
use readning_common::config::PipelineSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Emotion tag used when no phase applies
pub const NEUTRAL_EMOTION: &str = "neutral";

/// Emotional context attached to a chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkContext {
    pub emotion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub significance: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl ChunkContext {
    pub fn neutral() -> Self {
        Self::emotion_only(NEUTRAL_EMOTION)
    }

    pub fn emotion_only(emotion: &str) -> Self {
        Self {
            emotion: emotion.to_string(),
            transition: None,
            significance: None,
            explanation: None,
        }
    }

    /// Context for the span that ends where `phase` begins
    fn leading_into(phase: &EmotionalPhase) -> Self {
        Self {
            emotion: phase.emotion_before.clone(),
            transition: Some(phase.emotion_after.clone()),
            significance: Some(phase.significance),
            explanation: Some(phase.explanation.clone()),
        }
    }
}

/// Atomic unit of generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Non-empty, trimmed
    pub text: String,
    pub context: ChunkContext,
    /// Byte range of the chunk in the source text
    pub start_offset: usize,
    pub end_offset: usize,
    /// Came out of a span that exceeded the maximum size
    pub oversized: bool,
    /// Assigned by the page mapper
    pub page: Option<u32>,
}

impl TextChunk {
    pub fn char_len(&self) -> usize {
        char_len(&self.text)
    }
}

/// Size summary of an assembled chunk list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkStatistics {
    pub total_chunks: usize,
    pub average_size: f64,
    pub min_size: usize,
    pub max_size: usize,
    pub total_characters: usize,
}

impl ChunkStatistics {
    pub fn from_chunks(chunks: &[TextChunk]) -> Self {
        if chunks.is_empty() {
            return Self::default();
        }

        let sizes: Vec<usize> = chunks.iter().map(TextChunk::char_len).collect();
        let total_characters: usize = sizes.iter().sum();

        Self {
            total_chunks: chunks.len(),
            average_size: total_characters as f64 / chunks.len() as f64,
            min_size: sizes.iter().copied().min().unwrap_or(0),
            max_size: sizes.iter().copied().max().unwrap_or(0),
            total_characters,
        }
    }
}

/// Size-bounded chunk assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkAssembler {
    pub min_size: usize,
    pub max_size: usize,
}

impl From<&PipelineSettings> for ChunkAssembler {
    fn from(settings: &PipelineSettings) -> Self {
        Self::new(settings.min_chunk_size, settings.max_chunk_size)
    }
}

impl ChunkAssembler {
    pub fn new(min_size: usize, max_size: usize) -> Self {
        Self {
            min_size,
            max_size: max_size.max(1),
        }
    }

    /// Cut `text` at the positions of `phases` (already ordered and filtered).
    ///
    /// Phases without a position are ignored. With no positioned phase the
    /// whole trimmed text comes back as one neutral chunk.
    pub fn assemble(&self, text: &str, phases: &[EmotionalPhase]) -> Vec<TextChunk> {
        let (whole_start, whole_end) = trimmed_range(text, 0, text.len());
        if whole_start == whole_end {
            return Vec::new();
        }

        let positioned: Vec<(usize, &EmotionalPhase)> = phases
            .iter()
            .filter_map(|phase| {
                phase
                    .absolute_position
                    .filter(|&pos| pos <= text.len() && text.is_char_boundary(pos))
                    .map(|pos| (pos, phase))
            })
            .collect();

        if positioned.is_empty() {
            let whole = &text[whole_start..whole_end];
            debug!(chars = char_len(whole), "No positioned phases, emitting whole text as one chunk");
            return vec![TextChunk {
                text: whole.to_string(),
                context: ChunkContext::neutral(),
                start_offset: whole_start,
                end_offset: whole_end,
                oversized: char_len(whole) > self.max_size,
                page: None,
            }];
        }

        let mut chunks: Vec<TextChunk> = Vec::new();
        let mut last_pos = 0;
        let mut deferred = 0usize;
        let mut resplit = 0usize;

        for &(pos, phase) in &positioned {
            if pos <= last_pos {
                debug!(position = pos, last_pos, "Skipping phase at or before previous cut");
                continue;
            }

            let (start, end) = trimmed_range(text, last_pos, pos);
            let size = char_len(&text[start..end]);

            if size < self.min_size {
                // Leave last_pos in place so the next boundary absorbs this span
                deferred += 1;
                continue;
            }

            let context = ChunkContext::leading_into(phase);
            if size > self.max_size {
                resplit += 1;
                chunks.extend(self.split_oversized(text, start, end, &context));
            } else {
                chunks.push(chunk(text, start, end, context, false));
            }
            last_pos = pos;
        }

        let tail_emotion = positioned
            .last()
            .map(|(_, phase)| phase.emotion_after.as_str())
            .unwrap_or(NEUTRAL_EMOTION);
        let (start, end) = trimmed_range(text, last_pos, text.len());

        if start < end {
            let size = char_len(&text[start..end]);
            let context = ChunkContext::emotion_only(tail_emotion);

            let previous = chunks.last_mut().filter(|_| size < self.min_size);
            if let Some(previous) = previous {
                debug!(chars = size, "Appending undersized tail to previous chunk");
                previous.text.push(' ');
                previous.text.push_str(&text[start..end]);
                previous.end_offset = end;
            } else if size > self.max_size {
                resplit += 1;
                chunks.extend(self.split_oversized(text, start, end, &context));
            } else {
                chunks.push(chunk(text, start, end, context, false));
            }
        }

        let stats = ChunkStatistics::from_chunks(&chunks);
        info!(
            chunks = stats.total_chunks,
            average_size = stats.average_size as u64,
            min_size = stats.min_size,
            max_size = stats.max_size,
            deferred,
            resplit,
            "Assembled chunks"
        );

        chunks
    }

    /// Re-split `text[start..end]` at sentence ends into pieces of at most
    /// `max_size` characters, each carrying `context`.
    fn split_oversized(&self, text: &str, start: usize, end: usize, context: &ChunkContext) -> Vec<TextChunk> {
        self.resplit_ranges(&text[start..end])
            .into_iter()
            .map(|(a, b)| chunk(text, start + a, start + b, context.clone(), true))
            .collect()
    }

    /// Byte ranges (trimmed) of the re-split pieces of `segment`.
    ///
    /// Every piece except a rebalanced final pair is cut at a sentence end that
    /// leaves it between `min_size` and `max_size`. Without such a sentence end
    /// the cut falls on whitespace, then on a raw character count.
    fn resplit_ranges(&self, segment: &str) -> Vec<(usize, usize)> {
        let ends = sentence_ends(segment);
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        let mut pos = 0;

        loop {
            let (start, end) = trimmed_range(segment, pos, segment.len());
            if start == end {
                break;
            }
            if char_len(&segment[start..end]) <= self.max_size {
                ranges.push((start, end));
                break;
            }

            let cut = self
                .sentence_cut(segment, &ends, start)
                .unwrap_or_else(|| self.hard_cut(segment, start));
            ranges.push(trimmed_range(segment, start, cut));
            pos = cut;
        }

        self.rebalance_tail(segment, &mut ranges);
        ranges
    }

    /// Latest sentence end giving a piece within the size bounds
    fn sentence_cut(&self, segment: &str, ends: &[usize], start: usize) -> Option<usize> {
        let limit = advance_chars(segment, start, self.max_size);
        // Sentence ends include trailing whitespace
        let limit = limit + (segment[limit..].len() - segment[limit..].trim_start().len());

        ends.iter()
            .rev()
            .copied()
            .skip_while(|&cut| cut > limit)
            .take_while(|&cut| cut > start)
            .find(|&cut| {
                let (a, b) = trimmed_range(segment, start, cut);
                let size = char_len(&segment[a..b]);
                size >= self.min_size && size <= self.max_size
            })
    }

    /// Cut at the last whitespace that keeps the piece above `min_size`, else
    /// at exactly `max_size` characters
    fn hard_cut(&self, segment: &str, start: usize) -> usize {
        let limit = advance_chars(segment, start, self.max_size);
        let floor = advance_chars(segment, start, self.min_size);

        segment[floor..limit]
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(idx, _)| floor + idx)
            .filter(|&cut| {
                let (a, b) = trimmed_range(segment, start, cut);
                char_len(&segment[a..b]) >= self.min_size
            })
            .unwrap_or(limit)
    }

    /// Merge an undersized last piece into its predecessor, or split the pair
    /// evenly when the merge would exceed `max_size`
    fn rebalance_tail(&self, segment: &str, ranges: &mut Vec<(usize, usize)>) {
        if ranges.len() < 2 {
            return;
        }
        let (last_start, last_end) = ranges[ranges.len() - 1];
        if char_len(&segment[last_start..last_end]) >= self.min_size {
            return;
        }

        ranges.pop();
        let (prev_start, _) = ranges[ranges.len() - 1];
        let combined = &segment[prev_start..last_end];

        if char_len(combined) <= self.max_size {
            let idx = ranges.len() - 1;
            ranges[idx] = (prev_start, last_end);
        } else {
            let mid = prev_start + char_midpoint(combined);
            let idx = ranges.len() - 1;
            ranges[idx] = trimmed_range(segment, prev_start, mid);
            ranges.push(trimmed_range(segment, mid, last_end));
        }
    }
}

fn chunk(text: &str, start: usize, end: usize, context: ChunkContext, oversized: bool) -> TextChunk {
    TextChunk {
        text: text[start..end].to_string(),
        context,
        start_offset: start,
        end_offset: end,
        oversized,
        page: None,
    }
}
