use crate::config::ChunkingSettings;
use crate::error::{Error, Result};
use crate::types::TextChunk;

/// Fixed-size, overlapping character windows.
///
/// Sizes are counted in Unicode scalar values, never bytes, so a chunk
/// boundary can't split a multi-byte character.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        let s = ChunkingSettings::default();
        Self { chunk_size: s.chunk_size, chunk_overlap: s.chunk_overlap }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(s: &ChunkingSettings) -> Self {
        Self { chunk_size: s.chunk_size, chunk_overlap: s.chunk_overlap }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let config = Self { chunk_size, chunk_overlap };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Distance between consecutive chunk starts.
    pub fn stride(&self) -> usize { self.chunk_size - self.chunk_overlap }
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig { &self.config }

    /// Split `text` into chunks starting every `stride` characters.
    ///
    /// Each chunk is at most `chunk_size` long and ends no later than the start
    /// of the chunk two positions ahead, so overlap only ever joins neighbours.
    /// The final chunk runs to the end of the text and may be shorter.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        // byte offset of every char boundary, plus the end of the string
        let bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let total = bounds.len() - 1;
        let stride = self.config.stride();

        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < total {
            let end = start
                .saturating_add(self.config.chunk_size)
                .min(start.saturating_add(stride.saturating_mul(2)))
                .min(total);
            chunks.push(TextChunk { position: chunks.len(), text: text[bounds[start]..bounds[end]].to_string() });
            if end == total { break; }
            start = start.saturating_add(stride);
        }
        chunks
    }
}
