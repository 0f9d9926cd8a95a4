//! Audio generation capability
//!
//! Two implementations ship with the crate: an HTTP client for a generation
//! service, and an adapter that runs a synchronous in-process model on the
//! blocking thread pool so inference never stalls the async runtime.

use crate::error::GeneratorError;
use async_trait::async_trait;
use readning_common::config::GeneratorSettings;
use reqwest::Client;
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

/// One generation call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    /// Chunk prompt (global context plus local emotion)
    pub prompt: String,
    /// Shared conditioning, the same for every chunk of a document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditioning: Option<String>,
    pub duration_secs: f32,
}

/// WAV bytes plus their playing time
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAudio {
    pub wav: Vec<u8>,
    pub duration_secs: f32,
}

impl GeneratedAudio {
    /// Validate `wav` and read its duration from the header
    pub fn from_wav(wav: Vec<u8>) -> Result<Self, GeneratorError> {
        let (frames, sample_rate) = {
            let reader = hound::WavReader::new(Cursor::new(wav.as_slice()))?;
            (reader.duration(), reader.spec().sample_rate)
        };
        if sample_rate == 0 {
            return Err(GeneratorError::InvalidAudio("zero sample rate".to_string()));
        }
        Ok(Self {
            wav,
            duration_secs: frames as f32 / sample_rate as f32,
        })
    }
}

/// Opaque text-to-audio capability
#[async_trait]
pub trait AudioGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedAudio, GeneratorError>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// Generator backed by an HTTP service answering `POST /generate` with WAV bytes
pub struct HttpAudioGenerator {
    client: Client,
    endpoint: String,
}

impl HttpAudioGenerator {
    /// `request_timeout` bounds a single HTTP exchange
    pub fn new(settings: &GeneratorSettings, request_timeout: Duration) -> Result<Self, GeneratorError> {
        let client = Client::builder().timeout(request_timeout).build().map_err(|e| {
            GeneratorError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AudioGenerator for HttpAudioGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedAudio, GeneratorError> {
        let response = self
            .client
            .post(format!("{}/generate", self.endpoint))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        GeneratedAudio::from_wav(bytes.to_vec())
    }

    fn name(&self) -> &str {
        &self.endpoint
    }
}

/// Synchronous in-process model producing mono samples in `[-1.0, 1.0]`
pub trait BlockingModel: Send + Sync + 'static {
    fn sample_rate(&self) -> u32;

    fn generate(&self, prompt: &str, conditioning: Option<&str>, duration_secs: f32) -> Result<Vec<f32>, String>;
}

/// Runs a [`BlockingModel`] on `spawn_blocking` and encodes its output as WAV
pub struct BlockingAudioGenerator<M: BlockingModel> {
    model: Arc<M>,
    name: String,
}

impl<M: BlockingModel> BlockingAudioGenerator<M> {
    pub fn new(model: M, name: impl Into<String>) -> Self {
        Self {
            model: Arc::new(model),
            name: name.into(),
        }
    }
}

#[async_trait]
impl<M: BlockingModel> AudioGenerator for BlockingAudioGenerator<M> {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedAudio, GeneratorError> {
        let model = Arc::clone(&self.model);
        let request = request.clone();

        let samples = tokio::task::spawn_blocking(move || {
            model.generate(&request.prompt, request.conditioning.as_deref(), request.duration_secs)
        })
        .await
        .map_err(|e| GeneratorError::Blocking(e.to_string()))?
        .map_err(GeneratorError::Model)?;

        let wav = encode_wav(&samples, self.model.sample_rate())?;
        GeneratedAudio::from_wav(wav)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Encode mono float samples as 16-bit PCM WAV
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tone;

    impl BlockingModel for Tone {
        fn sample_rate(&self) -> u32 {
            8000
        }

        fn generate(&self, prompt: &str, _conditioning: Option<&str>, duration_secs: f32) -> Result<Vec<f32>, String> {
            if prompt.is_empty() {
                return Err("empty prompt".to_string());
            }
            let frames = (duration_secs * 8000.0) as usize;
            Ok((0..frames).map(|i| ((i as f32) * 0.05).sin() * 0.5).collect())
        }
    }

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            conditioning: None,
            duration_secs: 2.0,
        }
    }

    #[tokio::test]
    async fn test_blocking_model_output_is_wav() {
        let generator = BlockingAudioGenerator::new(Tone, "tone");
        let audio = generator.generate(&request("calm piano")).await.unwrap();

        assert!((audio.duration_secs - 2.0).abs() < 0.01);
        assert_eq!(&audio.wav[..4], b"RIFF");
    }

    #[tokio::test]
    async fn test_blocking_model_error_is_reported() {
        let generator = BlockingAudioGenerator::new(Tone, "tone");
        let err = generator.generate(&request("")).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Model(_)));
    }

    #[test]
    fn test_garbage_bytes_are_invalid_audio() {
        let err = GeneratedAudio::from_wav(b"not a wav file".to_vec()).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidAudio(_)));
    }

    #[test]
    fn test_request_omits_missing_conditioning() {
        let value = serde_json::to_value(request("x")).unwrap();
        assert!(value.get("conditioning").is_none());
        assert_eq!(value["duration_secs"], 2.0);
    }
}
