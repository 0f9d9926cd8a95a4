//! Local artifact storage
//!
//! Layout: `<output_root>/<namespace>/chunk_<n>/` holding the chunk's audio
//! (`audio.wav`, or `fallback.wav` when generation failed) and its text
//! (`chunk_<n>.txt`). URLs mirror the layout under `url_prefix`.

use super::generator::encode_wav;
use std::io;
use std::path::{Path, PathBuf};

/// Sample rate of the silent fallback clip
pub const FALLBACK_SAMPLE_RATE: u32 = 16_000;

/// Length of the silent fallback clip
pub const FALLBACK_DURATION_SECS: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    output_root: PathBuf,
    url_prefix: String,
}

impl LocalArtifactStore {
    pub fn new(output_root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            output_root: output_root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    fn chunk_dir(&self, namespace: &str, chunk_index: usize) -> PathBuf {
        self.output_root.join(namespace).join(format!("chunk_{}", chunk_index))
    }

    fn url(&self, namespace: &str, chunk_index: usize, file_name: &str) -> String {
        format!("{}/{}/chunk_{}/{}", self.url_prefix, namespace, chunk_index, file_name)
    }

    async fn write(&self, namespace: &str, chunk_index: usize, file_name: &str, contents: &[u8]) -> io::Result<String> {
        let dir = self.chunk_dir(namespace, chunk_index);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(file_name), contents).await?;
        Ok(self.url(namespace, chunk_index, file_name))
    }

    /// Store generated audio, returning its URL
    pub async fn write_audio(&self, namespace: &str, chunk_index: usize, wav: &[u8]) -> io::Result<String> {
        self.write(namespace, chunk_index, "audio.wav", wav).await
    }

    /// Store the chunk's full text, returning its URL
    pub async fn write_text(&self, namespace: &str, chunk_index: usize, text: &str) -> io::Result<String> {
        let file_name = format!("chunk_{}.txt", chunk_index);
        self.write(namespace, chunk_index, &file_name, text.as_bytes()).await
    }

    /// Store a one-second silent mono clip in place of failed audio
    pub async fn write_silence(&self, namespace: &str, chunk_index: usize) -> io::Result<String> {
        let frames = (FALLBACK_SAMPLE_RATE as f32 * FALLBACK_DURATION_SECS) as usize;
        let wav = encode_wav(&vec![0.0; frames], FALLBACK_SAMPLE_RATE)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        self.write(namespace, chunk_index, "fallback.wav", &wav).await
    }
}
