//! Audio generation for assembled chunks

pub mod artifacts;
pub mod generator;
pub mod orchestrator;
pub mod prompt;

pub use artifacts::LocalArtifactStore;
pub use generator::{
    AudioGenerator, BlockingAudioGenerator, BlockingModel, GeneratedAudio, GenerationRequest, HttpAudioGenerator,
};
pub use orchestrator::{ChunkArtifact, GenerationOrchestrator};
pub use prompt::PromptComposer;
