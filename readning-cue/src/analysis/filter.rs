//! Significance filter

use super::EmotionalPhase;

/// Keep phases whose significance is at least `threshold`, preserving order
pub fn filter_significant(phases: Vec<EmotionalPhase>, threshold: u8) -> Vec<EmotionalPhase> {
    let before = phases.len();
    let kept: Vec<EmotionalPhase> = phases
        .into_iter()
        .filter(|phase| phase.significance >= threshold)
        .collect();

    tracing::debug!(before, kept = kept.len(), threshold, "Filtered phases by significance");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(position: usize, significance: u8) -> EmotionalPhase {
        EmotionalPhase {
            anchor_text: format!("anchor {}", position),
            emotion_before: "a".into(),
            emotion_after: "b".into(),
            significance,
            explanation: String::new(),
            absolute_position: Some(position),
        }
    }

    #[test]
    fn test_threshold_is_inclusive_and_order_kept() {
        let phases = vec![phase(10, 3), phase(20, 1), phase(30, 5), phase(40, 2)];
        let kept = filter_significant(phases, 3);

        let positions: Vec<_> = kept.iter().filter_map(|p| p.absolute_position).collect();
        assert_eq!(positions, vec![10, 30]);
    }
}
