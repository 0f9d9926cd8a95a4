//! Runtime configuration
//!
//! Resolves the shared TOML configuration into the concrete paths and
//! component settings this service runs with.

use readning_common::config::{
    resolve_root_folder, DetectorSettings, GeneratorSettings, PipelineSettings, StorageSettings, TomlConfig,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything the service needs after start-up resolution
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub output_root: PathBuf,
    pub log_level: String,
    pub pipeline: PipelineSettings,
    pub detector: DetectorSettings,
    pub generator: GeneratorSettings,
    pub storage: StorageSettings,
}

impl RuntimeConfig {
    /// Resolve `config` against an optional root folder given on the command line
    pub fn resolve(config: TomlConfig, cli_root: Option<&Path>) -> Self {
        let root_folder = resolve_root_folder(cli_root, &config);
        let database_path = root_folder.join(&config.storage.database_file);
        let output_root = root_folder.join(&config.storage.output_dir);

        Self {
            root_folder,
            database_path,
            output_root,
            log_level: config.logging.level,
            pipeline: config.pipeline,
            detector: config.detector,
            generator: config.generator,
            storage: config.storage,
        }
    }

    /// Transport timeout for one generator HTTP call.
    ///
    /// Slightly longer than the orchestrator's own timeout so the
    /// orchestrator is the one that reports it.
    pub fn generator_request_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.generation_timeout_secs + 5)
    }
}
