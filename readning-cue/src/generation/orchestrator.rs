//! Generation orchestrator
//!
//! Fans generation out over a chunk list behind a semaphore, so at most
//! `max_concurrent_music_generation` calls are in flight. Each call has a hard
//! timeout. A failed or timed-out chunk gets a silent fallback clip and
//! `success = false`; the batch always returns one artifact per chunk, in
//! chunk order.

use super::artifacts::{LocalArtifactStore, FALLBACK_DURATION_SECS};
use super::generator::{AudioGenerator, GeneratedAudio, GenerationRequest};
use super::prompt::PromptComposer;
use crate::chunking::TextChunk;
use crate::error::{GeneratorError, PipelineResult};
use crate::segmentation::text::truncate_chars;
use futures::future::join_all;
use readning_common::config::PipelineSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Result of generating one chunk, success or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkArtifact {
    /// 1-based position within the batch
    pub chunk_index: usize,
    pub text_preview: String,
    pub full_text: String,
    pub emotion: String,
    pub artifact_url: String,
    pub text_url: String,
    /// Seconds of audio behind `artifact_url`
    pub duration: f32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub processing_ms: u64,
}

pub struct GenerationOrchestrator {
    generator: Arc<dyn AudioGenerator>,
    artifacts: LocalArtifactStore,
    gate: Arc<Semaphore>,
    timeout: Duration,
    preview_length: usize,
    clip_duration_secs: f32,
}

impl GenerationOrchestrator {
    pub fn new(
        generator: Arc<dyn AudioGenerator>,
        artifacts: LocalArtifactStore,
        settings: &PipelineSettings,
        clip_duration_secs: f32,
    ) -> Self {
        Self {
            generator,
            artifacts,
            gate: Arc::new(Semaphore::new(settings.max_concurrent_music_generation.max(1))),
            timeout: Duration::from_secs(settings.generation_timeout_secs),
            preview_length: settings.preview_length,
            clip_duration_secs,
        }
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generate audio for every chunk under `namespace`.
    ///
    /// Generator failures never fail the batch. Only failing to write an
    /// artifact to storage is returned as an error.
    pub async fn generate_all(
        &self,
        chunks: &[TextChunk],
        namespace: &str,
        composer: &PromptComposer,
    ) -> PipelineResult<Vec<ChunkArtifact>> {
        let started = Instant::now();

        let results = join_all(
            chunks
                .iter()
                .enumerate()
                .map(|(i, chunk)| self.generate_one(i + 1, chunk, namespace, composer)),
        )
        .await;

        let artifacts = results.into_iter().collect::<PipelineResult<Vec<_>>>()?;

        let succeeded = artifacts.iter().filter(|a| a.success).count();
        info!(
            namespace,
            total = artifacts.len(),
            succeeded,
            failed = artifacts.len() - succeeded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation batch finished"
        );

        Ok(artifacts)
    }

    async fn generate_one(
        &self,
        chunk_index: usize,
        chunk: &TextChunk,
        namespace: &str,
        composer: &PromptComposer,
    ) -> PipelineResult<ChunkArtifact> {
        let started = Instant::now();
        let request = GenerationRequest {
            prompt: composer.chunk_prompt(chunk),
            conditioning: Some(composer.global_prompt().to_string()),
            duration_secs: self.clip_duration_secs,
        };

        debug!(chunk_index, chars = chunk.char_len(), "Generating chunk audio");

        let (artifact_url, duration, error) = match self.call_generator(&request).await {
            Ok(audio) => {
                let url = self.artifacts.write_audio(namespace, chunk_index, &audio.wav).await?;
                (url, audio.duration_secs, None)
            }
            Err(err) => {
                warn!(
                    chunk_index,
                    generator = self.generator.name(),
                    error = %err,
                    "Generation failed, writing silent fallback"
                );
                let url = self.artifacts.write_silence(namespace, chunk_index).await?;
                (url, FALLBACK_DURATION_SECS, Some(err.to_string()))
            }
        };

        let text_url = self.artifacts.write_text(namespace, chunk_index, &chunk.text).await?;
        let processing_ms = started.elapsed().as_millis() as u64;

        debug!(chunk_index, processing_ms, success = error.is_none(), "Chunk finished");

        Ok(ChunkArtifact {
            chunk_index,
            text_preview: truncate_chars(&chunk.text, self.preview_length).to_string(),
            full_text: chunk.text.clone(),
            emotion: chunk.context.emotion.clone(),
            artifact_url,
            text_url,
            duration,
            success: error.is_none(),
            error,
            processing_ms,
        })
    }

    /// One gated, time-bounded generator call
    async fn call_generator(&self, request: &GenerationRequest) -> Result<GeneratedAudio, GeneratorError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| GeneratorError::Blocking(format!("generation gate closed: {}", e)))?;

        match tokio::time::timeout(self.timeout, self.generator.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(GeneratorError::Timeout(self.timeout.as_secs())),
        }
    }
}
