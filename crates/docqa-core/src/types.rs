//! Domain types shared by the ingest, index and answer stages.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

pub const MEDIA_PDF: &str = "application/pdf";
pub const MEDIA_PNG: &str = "image/png";
pub const MEDIA_JPEG: &str = "image/jpeg";

/// An uploaded file: a name, its declared media type and the raw bytes.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), media_type: media_type.into(), bytes }
    }

    /// Read a file from disk, declaring its media type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let media_type = media_type_for_extension(ext).ok_or_else(|| Error::UnsupportedMedia {
            document: name.clone(),
            media_type: format!("extension '{ext}'"),
        })?;
        let bytes = fs::read(path)?;
        Ok(Self { name, media_type: media_type.to_string(), bytes })
    }

    pub fn is_pdf(&self) -> bool { self.media_type == MEDIA_PDF }

    pub fn is_image(&self) -> bool { self.media_type == MEDIA_PNG || self.media_type == MEDIA_JPEG }
}

pub fn media_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => Some(MEDIA_PDF),
        "png" => Some(MEDIA_PNG),
        "jpg" | "jpeg" => Some(MEDIA_JPEG),
        _ => None,
    }
}

/// A chunk of the concatenated corpus text.
///
/// Chunks have no identity beyond `position` in the sequence produced by the
/// chunker; `text` is the payload that gets embedded and retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub position: usize,
    pub text: String,
}

/// A retrieved chunk. `score` is cosine similarity, higher is better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub position: usize,
    pub text: String,
    pub score: f32,
}

/// One piece of user content sent to the generative model.
#[derive(Debug, Clone)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

/// A single-turn request to the generative model.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub parts: Vec<Part>,
}

impl GenerationRequest {
    pub fn new() -> Self { Self::default() }

    pub fn system(mut self, text: impl Into<String>) -> Self {
        self.system = Some(text.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part::Text(text.into()));
        self
    }

    pub fn inline(mut self, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.parts.push(Part::InlineData { mime_type: mime_type.into(), data });
        self
    }

    /// All text parts joined by newlines, handy for inspection in tests and logs.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
