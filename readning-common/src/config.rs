//! Configuration loading and root folder resolution
//!
//! Settings come from a TOML file, individual values can be overridden through
//! `READNING_*` environment variables, and everything falls back to compiled
//! defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "READNING_ROOT";

/// Prefix for per-option environment overrides
pub const ENV_PREFIX: &str = "READNING_";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub pipeline: PipelineSettings,
    pub detector: DetectorSettings,
    pub generator: GeneratorSettings,
    pub storage: StorageSettings,
}

/// Logging section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (`RUST_LOG` wins when set)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Tunables for segmentation, analysis and generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Window size cap for the splitter (characters)
    pub max_segment_size: usize,
    /// Overlap between consecutive windows (characters)
    pub overlap_size: usize,
    /// Minimum phase importance retained (1-5)
    pub significance_threshold: u8,
    /// Lower chunk size bound (characters)
    pub min_chunk_size: usize,
    /// Upper chunk size bound (characters)
    pub max_chunk_size: usize,
    /// Page grouping size
    pub chunks_per_page: usize,
    /// Phase-detection concurrency bound
    pub max_concurrent_emotion_analysis: usize,
    /// Generation concurrency bound
    pub max_concurrent_music_generation: usize,
    /// Hard timeout for one window's analysis, retries included
    pub detection_timeout_secs: u64,
    /// Hard timeout for one generation call
    pub generation_timeout_secs: u64,
    /// Detection attempts before degrading to an empty result
    pub detection_max_attempts: u32,
    /// First retry delay, doubled on every further attempt
    pub detection_initial_backoff_ms: u64,
    /// Fraction of a window skipped before searching for a sentence end
    pub sentence_search_ratio: f64,
    /// Characters past the cut handed to the sentence segmenter
    pub sentence_lookahead: usize,
    /// Characters kept in a chunk's text preview
    pub preview_length: usize,
    /// How analysis windows are cut from the source text
    pub window_mode: WindowMode,
}

/// Window layout used for phase detection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Windows overlap by `overlap_size` characters
    #[default]
    Overlapping,
    /// Non-overlapping pages, each analysed with `overlap_size` characters of lookahead
    Paged,
}

impl FromStr for WindowMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overlapping" => Ok(WindowMode::Overlapping),
            "paged" => Ok(WindowMode::Paged),
            other => Err(format!("unknown window mode '{}'", other)),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_segment_size: 6000,
            overlap_size: 600,
            significance_threshold: 3,
            min_chunk_size: 200,
            max_chunk_size: 2000,
            chunks_per_page: 4,
            max_concurrent_emotion_analysis: 8,
            max_concurrent_music_generation: 1,
            detection_timeout_secs: 45,
            generation_timeout_secs: 300,
            detection_max_attempts: 3,
            detection_initial_backoff_ms: 2000,
            sentence_search_ratio: 0.8,
            sentence_lookahead: 200,
            preview_length: 500,
            window_mode: WindowMode::Overlapping,
        }
    }
}

impl PipelineSettings {
    /// Apply `READNING_<OPTION>` overrides on top of the current values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        env_override("MAX_SEGMENT_SIZE", &mut self.max_segment_size)?;
        env_override("OVERLAP_SIZE", &mut self.overlap_size)?;
        env_override("SIGNIFICANCE_THRESHOLD", &mut self.significance_threshold)?;
        env_override("MIN_CHUNK_SIZE", &mut self.min_chunk_size)?;
        env_override("MAX_CHUNK_SIZE", &mut self.max_chunk_size)?;
        env_override("CHUNKS_PER_PAGE", &mut self.chunks_per_page)?;
        env_override(
            "MAX_CONCURRENT_EMOTION_ANALYSIS",
            &mut self.max_concurrent_emotion_analysis,
        )?;
        env_override(
            "MAX_CONCURRENT_MUSIC_GENERATION",
            &mut self.max_concurrent_music_generation,
        )?;
        env_override("DETECTION_TIMEOUT_SECS", &mut self.detection_timeout_secs)?;
        env_override("GENERATION_TIMEOUT_SECS", &mut self.generation_timeout_secs)?;
        env_override("DETECTION_MAX_ATTEMPTS", &mut self.detection_max_attempts)?;
        env_override(
            "DETECTION_INITIAL_BACKOFF_MS",
            &mut self.detection_initial_backoff_ms,
        )?;
        env_override("SENTENCE_SEARCH_RATIO", &mut self.sentence_search_ratio)?;
        env_override("SENTENCE_LOOKAHEAD", &mut self.sentence_lookahead)?;
        env_override("PREVIEW_LENGTH", &mut self.preview_length)?;
        env_override("WINDOW_MODE", &mut self.window_mode)?;
        Ok(())
    }

    /// Reject combinations the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_segment_size", self.max_segment_size),
            ("min_chunk_size", self.min_chunk_size),
            ("max_chunk_size", self.max_chunk_size),
            ("chunks_per_page", self.chunks_per_page),
            (
                "max_concurrent_emotion_analysis",
                self.max_concurrent_emotion_analysis,
            ),
            (
                "max_concurrent_music_generation",
                self.max_concurrent_music_generation,
            ),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }

        if self.overlap_size >= self.max_segment_size {
            return Err(Error::Config(format!(
                "overlap_size ({}) must be smaller than max_segment_size ({})",
                self.overlap_size, self.max_segment_size
            )));
        }

        // Re-splitting an oversized span needs room for two minimum-size pieces
        if self.min_chunk_size.saturating_mul(2) > self.max_chunk_size {
            return Err(Error::Config(format!(
                "max_chunk_size ({}) must be at least twice min_chunk_size ({})",
                self.max_chunk_size, self.min_chunk_size
            )));
        }

        if !(1..=5).contains(&self.significance_threshold) {
            return Err(Error::Config(format!(
                "significance_threshold must be within 1..=5, got {}",
                self.significance_threshold
            )));
        }

        if !(self.sentence_search_ratio > 0.0 && self.sentence_search_ratio < 1.0) {
            return Err(Error::Config(format!(
                "sentence_search_ratio must be within (0, 1), got {}",
                self.sentence_search_ratio
            )));
        }

        if self.detection_max_attempts == 0 {
            return Err(Error::Config(
                "detection_max_attempts must be at least 1".to_string(),
            ));
        }

        if self.detection_timeout_secs == 0 || self.generation_timeout_secs == 0 {
            return Err(Error::Config("timeouts must be greater than zero".to_string()));
        }

        Ok(())
    }
}

/// Phase-detection (LLM) endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Ollama-compatible base URL
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    /// Context window requested from the model
    pub num_ctx: u32,
    /// Transport-level timeout for one HTTP call
    pub request_timeout_secs: u64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "gemma3:4b".to_string(),
            temperature: 0.7,
            num_ctx: 4096,
            request_timeout_secs: 120,
        }
    }
}

/// Audio generation endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Base URL of the generation service
    pub endpoint: String,
    /// Requested clip length in seconds
    pub clip_duration_secs: f32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8001".to_string(),
            clip_duration_secs: 15.0,
        }
    }
}

/// Database and artifact locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Database file name inside the root folder
    pub database_file: String,
    /// Artifact directory name inside the root folder
    pub output_dir: String,
    /// Prefix for artifact URLs handed to clients
    pub url_prefix: String,
    /// Total time allowed for retrying a locked database
    pub max_lock_wait_ms: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_file: "readning.db".to_string(),
            output_dir: "gen_musics".to_string(),
            url_prefix: "/gen_musics".to_string(),
            max_lock_wait_ms: 5000,
        }
    }
}

/// Parse one `READNING_<name>` variable into `target` when it is set
fn env_override<T>(name: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let key = format!("{}{}", ENV_PREFIX, name);
    if let Ok(raw) = std::env::var(&key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{}={:?}: {}", key, raw, e)))?;
    }
    Ok(())
}

/// Load a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Write a TOML config file, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    // Write to a sibling temp file first so readers never see a partial file
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Load configuration: explicit file, else the default location, else defaults.
///
/// Pipeline overrides from the environment are applied and the result is
/// validated before it is returned.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match explicit {
        Some(path) => load_toml_config(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from {}", path.display());
                load_toml_config(&path)?
            }
            _ => {
                tracing::debug!("No configuration file found, using defaults");
                TomlConfig::default()
            }
        },
    };

    config.pipeline.apply_env_overrides()?;
    config.pipeline.validate()?;
    Ok(config)
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// `~/.config/readning/config.toml` (or the platform equivalent)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("readning").join("config.toml"))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("readning"))
        .unwrap_or_else(|| PathBuf::from("./readning_data"))
}
