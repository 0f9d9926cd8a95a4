//! Scripted capabilities and fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use readning_common::config::PipelineSettings;
use readning_common::db::init_memory_database;
use readning_cue::analysis::{DetectionResponse, PhaseDetector};
use readning_cue::analysis::RawPhase;
use readning_cue::error::{DetectorError, GeneratorError};
use readning_cue::generation::generator::encode_wav;
use readning_cue::generation::{AudioGenerator, GeneratedAudio, GenerationRequest, LocalArtifactStore};
use readning_cue::store::{BookRecord, PageStore};
use readning_cue::workflow::Pipeline;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const FILLER: &str = "The night was long and quiet. ";

/// Emotion of paragraph `i`: every third paragraph is "dread"
pub fn label(i: usize) -> &'static str {
    if i % 3 == 0 {
        "dread"
    } else {
        "calm"
    }
}

pub fn opening(i: usize) -> String {
    format!("Paragraph {} begins here.", i)
}

/// `count` paragraphs of roughly 325 characters each
pub fn prose(count: usize) -> String {
    (1..=count)
        .map(|i| format!("{} {}", opening(i), FILLER.repeat(10)))
        .collect()
}

pub fn book() -> BookRecord {
    BookRecord {
        id: "book-1".to_string(),
        user_id: "reader".to_string(),
        title: "Night Train".to_string(),
    }
}

/// Reports a transition at the opening of every paragraph after the first
/// that appears in the window it is shown.
#[derive(Default)]
pub struct ParagraphDetector {
    pub calls: AtomicUsize,
}

#[async_trait]
impl PhaseDetector for ParagraphDetector {
    async fn detect(&self, text: &str) -> Result<DetectionResponse, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let phases = (2..=99)
            .map(|i| (i, opening(i)))
            .filter(|(_, anchor)| text.contains(anchor.as_str()))
            .map(|(i, anchor)| RawPhase {
                anchor_text: Some(anchor),
                emotion_before: Some(label(i - 1).to_string()),
                emotion_after: Some(label(i).to_string()),
                significance: Some(json!(4)),
                explanation: Some(format!("paragraph {}", i)),
                position: None,
            })
            .collect();

        Ok(DetectionResponse { phases })
    }

    fn name(&self) -> &str {
        "paragraph"
    }
}

/// Always answers with a non-retryable API error
#[derive(Default)]
pub struct BrokenDetector {
    pub calls: AtomicUsize,
}

#[async_trait]
impl PhaseDetector for BrokenDetector {
    async fn detect(&self, _text: &str) -> Result<DetectionResponse, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DetectorError::Api {
            status: 400,
            message: "model not found".to_string(),
        })
    }

    fn name(&self) -> &str {
        "broken"
    }
}

/// Counts calls and fails every prompt that mentions `fail_on`, or every
/// call while `down` is set
pub struct CountingGenerator {
    pub calls: AtomicUsize,
    pub fail_on: Option<&'static str>,
    pub down: AtomicBool,
}

impl CountingGenerator {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: None,
            down: AtomicBool::new(false),
        }
    }

    pub fn failing_on(needle: &'static str) -> Self {
        Self {
            fail_on: Some(needle),
            ..Self::new()
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioGenerator for CountingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedAudio, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.down.load(Ordering::SeqCst) {
            return Err(GeneratorError::Network("connection refused".to_string()));
        }
        if let Some(needle) = self.fail_on {
            if request.prompt.contains(needle) {
                return Err(GeneratorError::Model(format!("refused prompt with {}", needle)));
            }
        }

        // Two seconds of silence at 8 kHz
        let wav = encode_wav(&vec![0.0; 16_000], 8_000).map_err(GeneratorError::from)?;
        GeneratedAudio::from_wav(wav)
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// A pipeline over an in-memory database and a temporary artifact folder
pub struct Harness {
    pub pipeline: Pipeline,
    pub output: TempDir,
}

pub async fn harness(detector: Arc<dyn PhaseDetector>, generator: Arc<dyn AudioGenerator>) -> Harness {
    let output = tempfile::tempdir().unwrap();
    let store = PageStore::new(init_memory_database().await.unwrap(), 1000);
    let artifacts = LocalArtifactStore::new(output.path(), "/gen_musics");

    let pipeline = Pipeline::new(
        detector,
        generator,
        store,
        artifacts,
        PipelineSettings::default(),
        15.0,
    );

    Harness { pipeline, output }
}
