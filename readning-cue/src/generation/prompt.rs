//! Generation prompt composition
//!
//! A document gets one global prompt (title plus the emotion that dominates
//! the whole text). Each chunk prompt extends it with the chunk's own mood,
//! where the mood is heading, and how strong the shift is.

use crate::chunking::{TextChunk, NEUTRAL_EMOTION};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptComposer {
    global_prompt: String,
}

impl PromptComposer {
    /// Build the global context from a title and the chunks of the whole document
    pub fn for_document(title: &str, chunks: &[TextChunk]) -> Self {
        let dominant = dominant_emotion(chunks);
        let title = title.trim();

        let global_prompt = if title.is_empty() {
            format!("Instrumental background score for a story, overall mood {}", dominant)
        } else {
            format!(
                "Instrumental background score for the story \"{}\", overall mood {}",
                title, dominant
            )
        };

        Self { global_prompt }
    }

    pub fn global_prompt(&self) -> &str {
        &self.global_prompt
    }

    /// Global context followed by the chunk's local emotional context
    pub fn chunk_prompt(&self, chunk: &TextChunk) -> String {
        let context = &chunk.context;
        let mut prompt = format!("{}. This passage feels {}", self.global_prompt, context.emotion);

        if let Some(transition) = context.transition.as_deref().filter(|t| !t.trim().is_empty()) {
            prompt.push_str(&format!(", moving toward {}", transition));
        }
        if let Some(significance) = context.significance {
            prompt.push_str(&format!(", intensity {}/5", significance));
        }
        prompt.push('.');
        prompt
    }
}

/// Leading label of an emotion list ("Calm, hopeful" -> "calm")
fn primary_label(emotions: &str) -> String {
    emotions
        .split(',')
        .next()
        .map(|label| label.trim().to_lowercase())
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| NEUTRAL_EMOTION.to_string())
}

/// Primary emotion covering the most characters; ties go to the earliest
pub fn dominant_emotion(chunks: &[TextChunk]) -> String {
    let mut weights: HashMap<String, (usize, usize)> = HashMap::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let entry = weights.entry(primary_label(&chunk.context.emotion)).or_insert((0, i));
        entry.0 += chunk.char_len();
    }

    weights
        .into_iter()
        .max_by(|(_, (wa, ia)), (_, (wb, ib))| wa.cmp(wb).then(ib.cmp(ia)))
        .map(|(label, _)| label)
        .unwrap_or_else(|| NEUTRAL_EMOTION.to_string())
}
