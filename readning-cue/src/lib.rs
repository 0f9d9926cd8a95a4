//! readning-cue library interface
//!
//! Turns long-form prose into emotion-tagged chunks and drives bounded
//! concurrent audio generation over them. The binary in `main.rs` is a thin
//! CLI over [`workflow::Pipeline`].

pub mod analysis;
pub mod chunking;
pub mod config;
pub mod documents;
pub mod error;
pub mod generation;
pub mod retry;
pub mod segmentation;
pub mod store;
pub mod workflow;

pub use crate::error::{PipelineError, PipelineResult};
