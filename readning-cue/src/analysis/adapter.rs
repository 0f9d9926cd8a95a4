//! Phase detector adapter
//!
//! Wraps a [`PhaseDetector`] so that analysis never fails: every window gets a
//! [`PhaseAnalysis`], either `Completed` (possibly with zero phases, which is
//! a normal outcome for emotionally flat text) or `Degraded` with the reason
//! the detector could not be used.
//!
//! Each attempt makes the structured call first and falls back to the
//! free-form call plus JSON repair. Attempts are driven by the shared
//! [`RetryPolicy`]; the whole retry sequence for one window runs under a hard
//! timeout, and at most `max_concurrent_emotion_analysis` windows are in
//! flight at once.

use super::json_repair::parse_detection;
use super::{validate_phases, EmotionalPhase, PhaseDetector};
use crate::error::DetectorError;
use crate::retry::RetryPolicy;
use crate::segmentation::TextWindow;
use futures::future::join_all;
use readning_common::config::PipelineSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Outcome of analysing one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum AnalysisStatus {
    Completed,
    Degraded(String),
}

/// Validated phases for one window plus how they were obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseAnalysis {
    pub phases: Vec<EmotionalPhase>,
    pub status: AnalysisStatus,
}

impl PhaseAnalysis {
    fn degraded(reason: String) -> Self {
        Self {
            phases: Vec::new(),
            status: AnalysisStatus::Degraded(reason),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, AnalysisStatus::Degraded(_))
    }
}

/// Retrying, time-bounded, concurrency-gated front of a phase detector
#[derive(Clone)]
pub struct PhaseAnalyzer {
    detector: Arc<dyn PhaseDetector>,
    policy: RetryPolicy,
    timeout: Duration,
    gate: Arc<Semaphore>,
}

impl PhaseAnalyzer {
    pub fn new(detector: Arc<dyn PhaseDetector>, settings: &PipelineSettings) -> Self {
        Self {
            detector,
            policy: RetryPolicy::new(
                settings.detection_max_attempts,
                Duration::from_millis(settings.detection_initial_backoff_ms),
            ),
            timeout: Duration::from_secs(settings.detection_timeout_secs),
            gate: Arc::new(Semaphore::new(settings.max_concurrent_emotion_analysis.max(1))),
        }
    }

    /// Override the retry schedule
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the per-window timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Analyse one window's text. Never fails.
    pub async fn analyze(&self, window_text: &str) -> PhaseAnalysis {
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(_) => return PhaseAnalysis::degraded("analysis gate closed".to_string()),
        };

        let started = Instant::now();
        let attempts = self.policy.run(
            "phase detection",
            |attempt| self.attempt(window_text, attempt),
            DetectorError::is_retryable,
        );

        match tokio::time::timeout(self.timeout, attempts).await {
            Ok(Ok(phases)) => {
                debug!(
                    detector = self.detector.name(),
                    phases = phases.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Window analysed"
                );
                PhaseAnalysis {
                    phases,
                    status: AnalysisStatus::Completed,
                }
            }
            Ok(Err(failure)) => {
                warn!(
                    detector = self.detector.name(),
                    attempts = failure.attempts,
                    error = %failure.last_error,
                    "Phase detection failed, continuing without phases"
                );
                PhaseAnalysis::degraded(format!(
                    "detection failed after {} attempt(s): {}",
                    failure.attempts, failure.last_error
                ))
            }
            Err(_) => {
                let err = DetectorError::Timeout(self.timeout.as_secs());
                warn!(
                    detector = self.detector.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Phase detection timed out, continuing without phases"
                );
                PhaseAnalysis::degraded(err.to_string())
            }
        }
    }

    /// Analyse every window concurrently, bounded by the gate.
    ///
    /// Results line up with `windows` by index regardless of completion order.
    pub async fn analyze_all(&self, windows: &[TextWindow]) -> Vec<PhaseAnalysis> {
        let started = Instant::now();

        let analyses = join_all(windows.iter().enumerate().map(|(window_index, window)| async move {
            debug!(window_index, offset = window.start_offset, "Analysing window");
            self.analyze(&window.text).await
        }))
        .await;

        let degraded = analyses.iter().filter(|a| a.is_degraded()).count();
        info!(
            windows = windows.len(),
            completed = windows.len() - degraded,
            degraded,
            phases = analyses.iter().map(|a| a.phases.len()).sum::<usize>(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Phase analysis batch finished"
        );

        analyses
    }

    /// Structured call, then free-form call with repair
    async fn attempt(&self, text: &str, attempt: u32) -> Result<Vec<EmotionalPhase>, DetectorError> {
        let structured_err = match self.detector.detect(text).await {
            Ok(response) => return Ok(validate_phases(response.phases)),
            Err(err) => err,
        };

        debug!(attempt, error = %structured_err, "Structured detection failed, trying free-form");

        match self.detector.detect_freeform(text).await {
            Ok(raw) => parse_detection(&raw).map(|response| validate_phases(response.phases)),
            Err(DetectorError::Unsupported(_)) => Err(structured_err),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{DetectionResponse, RawPhase};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn phase(anchor: &str) -> RawPhase {
        RawPhase {
            anchor_text: Some(anchor.to_string()),
            emotion_before: Some("calm".into()),
            emotion_after: Some("fear".into()),
            significance: Some(json!(4)),
            explanation: Some("shift".into()),
            position: None,
        }
    }

    fn fast(detector: Arc<dyn PhaseDetector>) -> PhaseAnalyzer {
        PhaseAnalyzer::new(detector, &PipelineSettings::default())
            .with_policy(RetryPolicy::new(3, Duration::from_millis(1)))
    }

    /// Fails structured calls a fixed number of times, never offers free-form
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PhaseDetector for Flaky {
        async fn detect(&self, _text: &str) -> Result<DetectionResponse, DetectorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(DetectorError::Network("connection reset".into()))
            } else {
                Ok(DetectionResponse {
                    phases: vec![phase("The door opened")],
                })
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    /// Structured output always malformed, free-form answer needs repair
    struct ChattyOnly;

    #[async_trait]
    impl PhaseDetector for ChattyOnly {
        async fn detect(&self, _text: &str) -> Result<DetectionResponse, DetectorError> {
            Err(DetectorError::InvalidResponse("schema mismatch".into()))
        }

        async fn detect_freeform(&self, _text: &str) -> Result<String, DetectorError> {
            Ok("```json\n{\"phases\": [{\"anchor_text\": \"Then\", \"emotion_before\": \"joy\", \"emotion_after\": \"grief\", \"significance\": 5, \"explanation\": \"loss\"},]}\n```".into())
        }

        fn name(&self) -> &str {
            "chatty"
        }
    }

    struct Stuck;

    #[async_trait]
    impl PhaseDetector for Stuck {
        async fn detect(&self, _text: &str) -> Result<DetectionResponse, DetectorError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(DetectionResponse::default())
        }

        fn name(&self) -> &str {
            "stuck"
        }
    }

    #[tokio::test]
    async fn test_recovers_within_attempt_budget() {
        let detector = Arc::new(Flaky {
            failures: 2,
            calls: AtomicUsize::new(0),
        });
        let analysis = fast(detector.clone()).analyze("text").await;

        assert_eq!(analysis.status, AnalysisStatus::Completed);
        assert_eq!(analysis.phases.len(), 1);
        assert_eq!(detector.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_degrades_to_empty_after_exhaustion() {
        let detector = Arc::new(Flaky {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
        });
        let analysis = fast(detector.clone()).analyze("text").await;

        assert!(analysis.is_degraded());
        assert!(analysis.phases.is_empty());
        assert_eq!(detector.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_freeform_fallback_is_repaired() {
        let analysis = fast(Arc::new(ChattyOnly)).analyze("text").await;

        assert_eq!(analysis.status, AnalysisStatus::Completed);
        assert_eq!(analysis.phases[0].emotion_after, "grief");
    }

    #[tokio::test]
    async fn test_timeout_degrades() {
        let analyzer = fast(Arc::new(Stuck)).with_timeout(Duration::from_millis(20));
        let analysis = analyzer.analyze("text").await;

        match analysis.status {
            AnalysisStatus::Degraded(reason) => assert!(reason.contains("timed out")),
            other => panic!("expected degraded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_batch_returns_one_result_per_window() {
        let detector = Arc::new(Flaky {
            failures: 0,
            calls: AtomicUsize::new(0),
        });
        let windows: Vec<TextWindow> = (0..5)
            .map(|i| TextWindow {
                text: format!("window {}", i),
                start_offset: i * 10,
            })
            .collect();

        let analyses = fast(detector).analyze_all(&windows).await;
        assert_eq!(analyses.len(), 5);
        assert!(analyses.iter().all(|a| a.status == AnalysisStatus::Completed));
    }
}
