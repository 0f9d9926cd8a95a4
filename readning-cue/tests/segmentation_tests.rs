//! Text-to-chunk scenarios through the public API

use readning_common::config::{PipelineSettings, WindowMode};
use readning_cue::analysis::{filter_significant, order_phases, reconcile, EmotionalPhase};
use readning_cue::chunking::{paginate, ChunkAssembler, ChunkStatistics};
use readning_cue::segmentation::{windows_for, SplitOptions, TextWindow};

fn phase(anchor: &str, before: &str, after: &str, significance: u8, position: Option<usize>) -> EmotionalPhase {
    EmotionalPhase {
        anchor_text: anchor.to_string(),
        emotion_before: before.to_string(),
        emotion_after: after.to_string(),
        significance,
        explanation: String::new(),
        absolute_position: position,
    }
}

#[test]
fn test_short_text_is_one_window() {
    let text = "A quiet morning. The kettle hums on the stove!!";
    let options = SplitOptions::from(&PipelineSettings::default());

    for mode in [WindowMode::Overlapping, WindowMode::Paged] {
        let windows = windows_for(text, &options, mode);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_offset, 0);
        assert!(windows[0].text.starts_with("A quiet morning."));
    }
}

#[test]
fn test_no_phases_gives_one_neutral_chunk() {
    let text = "word ".repeat(600);
    let chunks = ChunkAssembler::new(200, 2000).assemble(&text, &[]);

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].context.emotion, "neutral");
    assert_eq!(chunks[0].text, text.trim());
    assert!(chunks[0].oversized);
}

#[test]
fn test_close_transitions_merge_forward() {
    let text = "a".repeat(1000);
    let phases = vec![
        phase("x", "calm", "uneasy", 4, Some(100)),
        phase("y", "uneasy", "fear", 4, Some(150)),
        phase("z", "fear", "relief", 5, Some(500)),
    ];

    let chunks = ChunkAssembler::new(200, 2000).assemble(&text, &phases);

    assert_eq!(chunks.len(), 2);
    assert_eq!((chunks[0].start_offset, chunks[0].end_offset), (0, 500));
    assert_eq!(chunks[0].context.emotion, "fear");
    assert_eq!(chunks[0].context.transition.as_deref(), Some("relief"));
    assert_eq!((chunks[1].start_offset, chunks[1].end_offset), (500, 1000));
    assert_eq!(chunks[1].context.emotion, "relief");
}

#[test]
fn test_overlapping_windows_yield_one_phase_per_transition() {
    let text = format!("{}Then the lights went out. {}", "Calm prose here. ".repeat(20), "Dark prose. ".repeat(20));
    let anchor = "Then the lights went out.";
    let absolute = text.find(anchor).unwrap();

    let first = TextWindow {
        text: text[..absolute + 40].to_string(),
        start_offset: 0,
    };
    let second = TextWindow {
        text: text[absolute - 50..].to_string(),
        start_offset: absolute - 50,
    };

    let mut phases = reconcile(&first, vec![phase(anchor, "calm", "dark", 3, None)]);
    phases.extend(reconcile(&second, vec![phase(anchor, "calm", "dark", 5, None)]));
    let ordered = order_phases(phases);

    assert_eq!(ordered.len(), 1);
    assert_eq!(ordered[0].absolute_position, Some(absolute));
    assert_eq!(ordered[0].significance, 5);
}

#[test]
fn test_filtered_assembly_covers_text_in_order() {
    let paragraphs: Vec<String> = (1..=6)
        .map(|i| format!("Scene {} opens. {}", i, "Rain kept falling on the roof. ".repeat(12)))
        .collect();
    let text: String = paragraphs.concat();

    let window = TextWindow {
        text: text.clone(),
        start_offset: 0,
    };
    let detected: Vec<EmotionalPhase> = (2..=6)
        .map(|i| {
            let significance = if i == 4 { 2 } else { 4 };
            phase(&format!("Scene {} opens.", i), "calm", "tense", significance, None)
        })
        .collect();

    let phases = filter_significant(reconcile(&window, detected), 3);
    assert_eq!(phases.len(), 4);

    let mut chunks = ChunkAssembler::new(200, 2000).assemble(&text, &phases);
    assert_eq!(chunks.len(), 5);
    assert!(chunks.windows(2).all(|w| w[0].end_offset <= w[1].start_offset));
    assert!(chunks[2].text.contains("Scene 4 opens."));

    let stats = ChunkStatistics::from_chunks(&chunks);
    assert_eq!(stats.total_chunks, 5);
    assert!(stats.max_size <= 2000);

    let pages = paginate(&mut chunks, 2);
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[&3].count, 1);
    assert!(chunks.iter().all(|c| c.page.is_some()));
}
