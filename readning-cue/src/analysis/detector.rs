//! Phase detection capability
//!
//! [`PhaseDetector`] is the seam between the pipeline and whatever model finds
//! emotional turning points. The pipeline only ever sees it through
//! [`super::PhaseAnalyzer`], which adds retries, timeouts and the concurrency
//! gate.

use super::DetectionResponse;
use crate::error::DetectorError;
use async_trait::async_trait;
use readning_common::config::DetectorSettings;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// External capability that finds emotional transitions in a text window
#[async_trait]
pub trait PhaseDetector: Send + Sync {
    /// Structured call: the backend is asked for output matching the phase schema
    async fn detect(&self, text: &str) -> Result<DetectionResponse, DetectorError>;

    /// Less structured call returning the model's raw answer, parsed by the caller
    async fn detect_freeform(&self, _text: &str) -> Result<String, DetectorError> {
        Err(DetectorError::Unsupported("free-form detection"))
    }

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// Build the instruction sent with every window
pub fn detection_prompt(segment: &str) -> String {
    format!(
        r#"You are assisting an audio engine that scores background music for a story.
Find the emotionally meaningful turning points so the music can change exactly
when the reader's feelings shift.

Output a single JSON object and nothing else. If there are no turning points,
return {{"phases":[]}}.

For each turning point give:
- anchor_text: a short exact quotation (60 characters or fewer) where the transition starts
- emotion_before: main feelings just before (comma-separated, at most 3)
- emotion_after: main feelings just after (comma-separated, at most 3)
- significance: 1 (slight) to 5 (major) for how strongly the reader's emotion changes
- explanation: one short sentence on why the moment matters musically

TEXT SEGMENT:
{segment}"#
    )
}

/// JSON schema the structured call asks the model to follow
fn phase_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "phases": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "anchor_text": { "type": "string" },
                        "emotion_before": { "type": "string" },
                        "emotion_after": { "type": "string" },
                        "significance": { "type": "integer", "minimum": 1, "maximum": 5 },
                        "explanation": { "type": "string" }
                    },
                    "required": ["anchor_text", "emotion_before", "emotion_after", "significance", "explanation"]
                }
            }
        },
        "required": ["phases"]
    })
}

/// Phase detector backed by an Ollama chat endpoint
pub struct OllamaPhaseDetector {
    client: Client,
    settings: DetectorSettings,
}

impl OllamaPhaseDetector {
    pub fn new(settings: DetectorSettings) -> Result<Self, DetectorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| {
                DetectorError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, settings })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.settings.endpoint.trim_end_matches('/'), path)
    }

    async fn chat(&self, text: &str, format: Option<serde_json::Value>) -> Result<String, DetectorError> {
        let request = OllamaChatRequest {
            model: self.settings.model.clone(),
            messages: vec![OllamaMessage {
                role: "user".to_string(),
                content: detection_prompt(text),
            }],
            stream: false,
            format,
            options: OllamaOptions {
                temperature: self.settings.temperature,
                num_ctx: self.settings.num_ctx,
            },
        };

        let response = self.client.post(self.api_url("/chat")).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            // 5xx is transient, 4xx is not
            if status.is_server_error() {
                return Err(DetectorError::Network(format!("Server error {}: {}", status, message)));
            }
            return Err(DetectorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| DetectorError::InvalidResponse(e.to_string()))?;

        Ok(body.message.content)
    }
}

#[async_trait]
impl PhaseDetector for OllamaPhaseDetector {
    async fn detect(&self, text: &str) -> Result<DetectionResponse, DetectorError> {
        let content = self.chat(text, Some(phase_schema())).await?;
        serde_json::from_str(&content).map_err(|e| {
            DetectorError::InvalidResponse(format!("structured output did not parse: {}", e))
        })
    }

    async fn detect_freeform(&self, text: &str) -> Result<String, DetectorError> {
        self.chat(text, None).await
    }

    fn name(&self) -> &str {
        &self.settings.model
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}
