//! Document boundary
//!
//! Turns an input file into ordered `{title, content}` chapters. Only plain
//! text is read here; PDF and EPUB conversion happen outside this service.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub content: String,
}

/// Load `path` as a list of chapters.
///
/// A `.txt` file becomes a single chapter titled after the file stem.
pub async fn load_document(path: &Path) -> PipelineResult<Vec<Chapter>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| PipelineError::InvalidInput(format!("cannot read {}: {}", path.display(), e)))?;
            let content = String::from_utf8_lossy(&bytes).replace("\r\n", "\n");
            let title = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("untitled")
                .to_string();

            debug!(path = %path.display(), bytes = bytes.len(), "Loaded text document");
            Ok(vec![Chapter { title, content }])
        }
        "pdf" | "epub" => Err(PipelineError::InvalidInput(format!(
            "{} documents must be converted to text before processing",
            extension
        ))),
        other => Err(PipelineError::InvalidInput(format!(
            "unsupported document type '{}'",
            other
        ))),
    }
}

/// Join chapters into one text, separated by blank lines
pub fn full_text(chapters: &[Chapter]) -> String {
    chapters
        .iter()
        .map(|c| c.content.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
