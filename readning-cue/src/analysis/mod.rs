//! Emotional phase detection and reconciliation
//!
//! Raw detector output is loosely typed. [`RawPhase::validate`] is the only
//! way to obtain an [`EmotionalPhase`], so malformed entries are rejected at
//! the adapter boundary and never travel further down the pipeline.

pub mod adapter;
pub mod detector;
pub mod filter;
pub mod json_repair;
pub mod reconciler;

pub use adapter::{AnalysisStatus, PhaseAnalysis, PhaseAnalyzer};
pub use detector::{OllamaPhaseDetector, PhaseDetector};
pub use filter::filter_significant;
pub use reconciler::{locate_anchor, order_phases, reconcile};

use crate::segmentation::text::truncate_chars;
use serde::{Deserialize, Serialize};

/// Longest anchor kept, in characters
pub const MAX_ANCHOR_CHARS: usize = 100;

/// Longest explanation kept, in characters
pub const MAX_EXPLANATION_CHARS: usize = 200;

/// One detected emotional transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalPhase {
    /// Quotation from the text where the transition starts
    pub anchor_text: String,
    pub emotion_before: String,
    pub emotion_after: String,
    /// 1 (minor) to 5 (major)
    pub significance: u8,
    pub explanation: String,
    /// Byte offset in the full source text, once reconciled
    pub absolute_position: Option<usize>,
}

/// Phase list as returned by a detector
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionResponse {
    #[serde(default, alias = "emotional_phases")]
    pub phases: Vec<RawPhase>,
}

/// Unvalidated phase entry, accepting the field spellings detectors use
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPhase {
    #[serde(default, alias = "start_text")]
    pub anchor_text: Option<String>,
    #[serde(default, alias = "emotions_before")]
    pub emotion_before: Option<String>,
    #[serde(default, alias = "emotions_after")]
    pub emotion_after: Option<String>,
    /// Number or numeric string
    #[serde(default)]
    pub significance: Option<serde_json::Value>,
    #[serde(default)]
    pub explanation: Option<String>,
    /// Offset hint; positions are always recomputed from the anchor
    #[serde(default)]
    pub position: Option<i64>,
}

impl RawPhase {
    /// Check required fields and ranges, normalising whitespace and lengths
    pub fn validate(self) -> Result<EmotionalPhase, String> {
        let anchor = non_blank(self.anchor_text, "anchor_text")?;
        let emotion_before = non_blank(self.emotion_before, "emotion_before")?;
        let emotion_after = non_blank(self.emotion_after, "emotion_after")?;

        let significance = match &self.significance {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| "significance missing or not numeric".to_string())?;

        if !(1.0..=5.0).contains(&significance) {
            return Err(format!("significance {} outside 1..=5", significance));
        }

        let explanation = self.explanation.unwrap_or_default();

        Ok(EmotionalPhase {
            anchor_text: truncate_chars(&anchor, MAX_ANCHOR_CHARS).to_string(),
            emotion_before,
            emotion_after,
            significance: significance.round() as u8,
            explanation: truncate_chars(explanation.trim(), MAX_EXPLANATION_CHARS).to_string(),
            absolute_position: None,
        })
    }
}

fn non_blank(value: Option<String>, field: &str) -> Result<String, String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(format!("{} is empty", field)),
    }
}

/// Validate every raw phase, dropping (and logging) the malformed ones
pub fn validate_phases(raw: Vec<RawPhase>) -> Vec<EmotionalPhase> {
    let total = raw.len();
    let phases: Vec<EmotionalPhase> = raw
        .into_iter()
        .filter_map(|phase| match phase.validate() {
            Ok(valid) => Some(valid),
            Err(reason) => {
                tracing::warn!(reason = %reason, "Dropping malformed phase");
                None
            }
        })
        .collect();

    if phases.len() < total {
        tracing::debug!(kept = phases.len(), total, "Validated detector phases");
    }
    phases
}
