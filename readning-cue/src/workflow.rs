//! Pipeline entry points
//!
//! A run moves through SPLITTING → ANALYZING → ASSEMBLING → GENERATING →
//! PERSISTING → COMPLETED, recording per-stage timings and every degraded
//! step. Book mode paginates the assembled chunks and consults the page store
//! before generating each page. Unit mode consults it before doing anything.

use crate::analysis::{filter_significant, order_phases, reconcile, PhaseAnalyzer, PhaseDetector, AnalysisStatus};
use crate::chunking::{paginate, ChunkAssembler, ChunkStatistics, TextChunk};
use crate::error::{PipelineError, PipelineResult};
use crate::generation::{AudioGenerator, ChunkArtifact, GenerationOrchestrator, LocalArtifactStore, PromptComposer};
use crate::segmentation::{text::char_len, windows_for, SplitOptions};
use crate::store::{BookRecord, CachedPage, PageStore, StoredChunk};
use chrono::{DateTime, Utc};
use readning_common::config::PipelineSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    Pending,
    /// Text cut into analysis windows
    Splitting,
    /// Phase detection over all windows
    Analyzing,
    /// Reconcile, filter, assemble, paginate
    Assembling,
    Generating,
    Persisting,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub old_state: RunState,
    pub new_state: RunState,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory bookkeeping for one pipeline invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub run_id: Uuid,
    pub book_id: String,
    pub state: RunState,
    /// Seconds spent per stage, summed across pages
    pub processing_times: BTreeMap<String, f64>,
    /// Degraded steps; the run still completes
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    pub fn new(book_id: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            book_id: book_id.to_string(),
            state: RunState::Pending,
            processing_times: BTreeMap::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn transition_to(&mut self, new_state: RunState) -> StateTransition {
        let transition = StateTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if matches!(new_state, RunState::Completed | RunState::Failed) {
            self.ended_at = Some(Utc::now());
        }

        tracing::debug!(
            run_id = %self.run_id,
            from = ?transition.old_state,
            to = ?transition.new_state,
            "Run state changed"
        );
        transition
    }

    /// Add the time since `started` to `stage`
    pub fn record_time(&mut self, stage: &str, started: Instant) {
        *self.processing_times.entry(stage.to_string()).or_insert(0.0) += started.elapsed().as_secs_f64();
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        tracing::warn!(run_id = %self.run_id, error = %error, "Run degraded");
        self.errors.push(error);
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RunState::Completed | RunState::Failed)
    }
}

/// One chunk as reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageChunk {
    pub chunk_index: usize,
    pub text_preview: String,
    pub emotion: String,
    pub audio_url: String,
    pub duration: f64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ChunkArtifact> for PageChunk {
    fn from(artifact: &ChunkArtifact) -> Self {
        Self {
            chunk_index: artifact.chunk_index,
            text_preview: artifact.text_preview.clone(),
            emotion: artifact.emotion.clone(),
            audio_url: artifact.artifact_url.clone(),
            duration: artifact.duration as f64,
            success: artifact.success,
            error: artifact.error.clone(),
        }
    }
}

impl From<&StoredChunk> for PageChunk {
    fn from(chunk: &StoredChunk) -> Self {
        Self {
            chunk_index: chunk.chunk_index.max(0) as usize,
            text_preview: chunk.text_preview.clone(),
            emotion: chunk.emotion.clone(),
            audio_url: chunk.audio_url.clone(),
            duration: chunk.audio_duration,
            success: chunk.success,
            error: chunk.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    pub page: u32,
    /// Served from the page store without generating
    pub cached: bool,
    pub total_duration: f64,
    pub chunks: Vec<PageChunk>,
}

impl PageReport {
    fn from_cache(cached: CachedPage) -> Self {
        Self {
            page: cached.page,
            cached: true,
            total_duration: cached.total_duration,
            chunks: cached.chunks.iter().map(PageChunk::from).collect(),
        }
    }

    /// Every chunk on the page produced real audio
    pub fn is_successful(&self) -> bool {
        self.chunks.iter().all(|c| c.success)
    }
}

/// What a caller gets back from a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub message: String,
    pub run_id: Uuid,
    pub book_id: String,
    pub text_length: usize,
    pub total_pages: usize,
    pub total_chunks: usize,
    pub total_duration: f64,
    pub successful_pages: usize,
    pub statistics: Option<ChunkStatistics>,
    pub pages: Vec<PageReport>,
    pub processing_times: BTreeMap<String, f64>,
    pub errors: Vec<String>,
}

/// The assembled pipeline with its capabilities injected
pub struct Pipeline {
    analyzer: PhaseAnalyzer,
    orchestrator: GenerationOrchestrator,
    store: PageStore,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        detector: Arc<dyn PhaseDetector>,
        generator: Arc<dyn AudioGenerator>,
        store: PageStore,
        artifacts: LocalArtifactStore,
        settings: PipelineSettings,
        clip_duration_secs: f32,
    ) -> Self {
        Self {
            analyzer: PhaseAnalyzer::new(detector, &settings),
            orchestrator: GenerationOrchestrator::new(generator, artifacts, &settings, clip_duration_secs),
            store,
            settings,
        }
    }

    /// Replace the phase analyzer (custom retry schedule or timeout)
    pub fn with_analyzer(mut self, analyzer: PhaseAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Replace the generation orchestrator (custom timeout)
    pub fn with_orchestrator(mut self, orchestrator: GenerationOrchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    /// Process a whole book: segment, paginate, then generate each page not
    /// already in the store.
    pub async fn run_book(&self, book: &BookRecord, text: &str) -> PipelineResult<WorkflowReport> {
        preflight(book, text)?;

        let mut run = WorkflowRun::new(&book.id);
        tracing::info!(run_id = %run.run_id, book_id = %book.id, chars = char_len(text), "Book run started");

        let mut chunks = self.segment(&mut run, text).await;
        let statistics = ChunkStatistics::from_chunks(&chunks);

        let started = Instant::now();
        let pages = paginate(&mut chunks, self.settings.chunks_per_page);
        let composer = PromptComposer::for_document(&book.title, &chunks);
        run.record_time("pagination", started);

        let mut reports = Vec::with_capacity(pages.len());
        for (page, span) in &pages {
            let report = self
                .process_page(&mut run, book, *page, &chunks[span.range()], &composer)
                .await
                .inspect_err(|_| {
                    run.transition_to(RunState::Failed);
                })?;
            reports.push(report);
        }

        Ok(self.finish(run, book, text, Some(statistics), reports))
    }

    /// Process `text` as the single page `page`.
    ///
    /// The store is consulted before splitting, so a completed unit costs one
    /// lookup and no capability calls.
    pub async fn run_unit(&self, book: &BookRecord, page: u32, text: &str) -> PipelineResult<WorkflowReport> {
        preflight(book, text)?;
        if page == 0 {
            return Err(PipelineError::InvalidInput("page numbers start at 1".to_string()));
        }

        let mut run = WorkflowRun::new(&book.id);
        tracing::info!(run_id = %run.run_id, book_id = %book.id, page, "Unit run started");

        if let Some(cached) = self.store.ensure_generated(&book.id, page).await? {
            tracing::info!(book_id = %book.id, page, "Unit already generated, skipping");
            let reports = vec![PageReport::from_cache(cached)];
            return Ok(self.finish(run, book, text, None, reports));
        }

        let mut chunks = self.segment(&mut run, text).await;
        let statistics = ChunkStatistics::from_chunks(&chunks);
        for chunk in &mut chunks {
            chunk.page = Some(page);
        }
        let composer = PromptComposer::for_document(&book.title, &chunks);

        let report = self
            .generate_page(&mut run, book, page, &chunks, &composer)
            .await
            .inspect_err(|_| {
                run.transition_to(RunState::Failed);
            })?;

        Ok(self.finish(run, book, text, Some(statistics), vec![report]))
    }

    /// Split, analyse, reconcile, filter and assemble. Never fails.
    async fn segment(&self, run: &mut WorkflowRun, text: &str) -> Vec<TextChunk> {
        run.transition_to(RunState::Splitting);
        let started = Instant::now();
        let windows = windows_for(text, &SplitOptions::from(&self.settings), self.settings.window_mode);
        run.record_time("splitting", started);
        tracing::info!(run_id = %run.run_id, windows = windows.len(), "Text split");

        run.transition_to(RunState::Analyzing);
        let started = Instant::now();
        let analyses = self.analyzer.analyze_all(&windows).await;
        run.record_time("analysis", started);

        run.transition_to(RunState::Assembling);
        let started = Instant::now();
        let mut phases = Vec::new();
        for (window_index, (window, analysis)) in windows.iter().zip(analyses).enumerate() {
            if let AnalysisStatus::Degraded(reason) = &analysis.status {
                run.record_error(format!("window {}: phase detection degraded: {}", window_index + 1, reason));
            }
            phases.extend(reconcile(window, analysis.phases));
        }

        let detected = phases.len();
        let significant = filter_significant(order_phases(phases), self.settings.significance_threshold);
        let chunks = ChunkAssembler::from(&self.settings).assemble(text, &significant);
        run.record_time("assembly", started);

        let stats = ChunkStatistics::from_chunks(&chunks);
        tracing::info!(
            run_id = %run.run_id,
            detected,
            significant = significant.len(),
            chunks = stats.total_chunks,
            average_size = stats.average_size,
            min_size = stats.min_size,
            max_size = stats.max_size,
            "Chunks assembled"
        );

        chunks
    }

    /// Gate check then generate for one page of a book run
    async fn process_page(
        &self,
        run: &mut WorkflowRun,
        book: &BookRecord,
        page: u32,
        chunks: &[TextChunk],
        composer: &PromptComposer,
    ) -> PipelineResult<PageReport> {
        if let Some(cached) = self.store.ensure_generated(&book.id, page).await? {
            tracing::info!(book_id = %book.id, page, "Page already generated, skipping");
            return Ok(PageReport::from_cache(cached));
        }

        self.generate_page(run, book, page, chunks, composer).await
    }

    async fn generate_page(
        &self,
        run: &mut WorkflowRun,
        book: &BookRecord,
        page: u32,
        chunks: &[TextChunk],
        composer: &PromptComposer,
    ) -> PipelineResult<PageReport> {
        run.transition_to(RunState::Generating);
        let started = Instant::now();
        let namespace = format!("{}/page_{}", book.id, page);
        let artifacts = self.orchestrator.generate_all(chunks, &namespace, composer).await?;
        run.record_time("generation", started);

        for artifact in artifacts.iter().filter(|a| !a.success) {
            run.record_error(format!(
                "page {} chunk {}: {}",
                page,
                artifact.chunk_index,
                artifact.error.as_deref().unwrap_or("generation failed")
            ));
        }

        let total_duration: f64 = artifacts.iter().map(|a| a.duration as f64).sum();

        run.transition_to(RunState::Persisting);
        let started = Instant::now();
        self.store.persist(book, page, &artifacts, total_duration).await?;
        run.record_time("persistence", started);

        Ok(PageReport {
            page,
            cached: false,
            total_duration,
            chunks: artifacts.iter().map(PageChunk::from).collect(),
        })
    }

    fn finish(
        &self,
        mut run: WorkflowRun,
        book: &BookRecord,
        text: &str,
        statistics: Option<ChunkStatistics>,
        pages: Vec<PageReport>,
    ) -> WorkflowReport {
        run.transition_to(RunState::Completed);

        let total_chunks = pages.iter().map(|p| p.chunks.len()).sum();
        let total_duration = pages.iter().map(|p| p.total_duration).sum();
        let successful_pages = pages.iter().filter(|p| p.is_successful()).count();
        let cached_pages = pages.iter().filter(|p| p.cached).count();

        let message = if run.errors.is_empty() {
            format!("Processed {} pages ({} cached)", pages.len(), cached_pages)
        } else {
            format!(
                "Processed {} pages ({} cached) with {} errors",
                pages.len(),
                cached_pages,
                run.errors.len()
            )
        };

        tracing::info!(
            run_id = %run.run_id,
            book_id = %book.id,
            pages = pages.len(),
            cached_pages,
            successful_pages,
            total_chunks,
            errors = run.errors.len(),
            times = ?run.processing_times,
            "Run completed"
        );

        WorkflowReport {
            message,
            run_id: run.run_id,
            book_id: book.id.clone(),
            text_length: char_len(text),
            total_pages: pages.len(),
            total_chunks,
            total_duration,
            successful_pages,
            statistics,
            pages,
            processing_times: run.processing_times,
            errors: run.errors,
        }
    }
}

/// Reject input before any capability is invoked
fn preflight(book: &BookRecord, text: &str) -> PipelineResult<()> {
    if book.id.trim().is_empty() {
        return Err(PipelineError::InvalidInput("book id is empty".to_string()));
    }
    if text.trim().is_empty() {
        return Err(PipelineError::InvalidInput("text is empty".to_string()));
    }
    Ok(())
}
