//! Retrieval-augmented question answering over uploaded PDFs.
//!
//! Build phase: extract → chunk → embed and index. Query phase: embed the
//! question, fetch the nearest chunks and ask the generator to answer from
//! them alone.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use docqa_core::chunker::{Chunker, ChunkingConfig};
use docqa_core::config::Settings;
use docqa_core::error::{Error, Result};
use docqa_core::ingest::extract_text;
use docqa_core::traits::{Embedder, Generator};
use docqa_core::types::{Document, GenerationRequest, SearchHit};
use docqa_vector::{IndexMeta, LanceSearchEngine};

/// What the model is told to say when the context has no answer.
pub const NOT_IN_CONTEXT: &str = "answer is not available in the context";

const PROMPT_TEMPLATE: &str = r#"
You are a chatbot having a conversation with a human.

Answer the following question as detailed as possible from the provided context,
make sure to provide all the details, if the answer is not in provided context
just say, "answer is not available in the context", don't provide the wrong answer

Context: {context}
Question: {user_question}

Answer:
"#;

/// Fill the answer template with retrieved context and the raw question.
pub fn build_prompt(context: &str, user_question: &str) -> String {
    PROMPT_TEMPLATE.replace("{context}", context).replace("{user_question}", user_question)
}

/// Replace the index at `index_dir` with one built from `documents`.
///
/// Needs only the embedder, so the index can be built without a generator.
pub async fn build_index<E>(documents: &[Document], chunker: &Chunker, index_dir: &Path, embedder: &E) -> Result<IndexMeta>
where
    E: Embedder + ?Sized,
{
    info!("Building index from {} document(s) into {}", documents.len(), index_dir.display());
    let text = extract_text(documents)?;
    let chunks = chunker.split(&text);
    info!(
        "Split into {} chunk(s) (size {}, overlap {})",
        chunks.len(),
        chunker.config().chunk_size,
        chunker.config().chunk_overlap
    );
    docqa_vector::build_index(index_dir, &chunks, embedder).await
}

pub struct PdfChat<E, G>
where
    E: Embedder,
    G: Generator,
{
    embedder: E,
    generator: G,
    chunker: Chunker,
    index_dir: PathBuf,
    top_k: usize,
}

impl<E, G> PdfChat<E, G>
where
    E: Embedder,
    G: Generator,
{
    pub fn new(embedder: E, generator: G, chunker: Chunker, index_dir: impl Into<PathBuf>, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(Error::InvalidConfig("top_k must be > 0".to_string()));
        }
        Ok(Self { embedder, generator, chunker, index_dir: index_dir.into(), top_k })
    }

    pub fn from_settings(embedder: E, generator: G, settings: &Settings, index_dir: impl Into<PathBuf>) -> Result<Self> {
        let chunker = Chunker::new(ChunkingConfig::from(&settings.chunking))?;
        Self::new(embedder, generator, chunker, index_dir, settings.index.top_k)
    }

    pub fn index_dir(&self) -> &Path { &self.index_dir }

    /// Replace the index with one built from `documents`.
    pub async fn build_index(&self, documents: &[Document]) -> Result<IndexMeta> {
        build_index(documents, &self.chunker, &self.index_dir, &self.embedder).await
    }

    /// Top-k chunks for `question`, best first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchHit>> {
        let engine = LanceSearchEngine::open(&self.index_dir).await?;
        let meta = engine.meta();
        if meta.embedder_id != self.embedder.model_id() {
            return Err(Error::EmbeddingModelMismatch {
                index: meta.embedder_id.clone(),
                current: self.embedder.model_id().to_string(),
            });
        }
        let mut vectors = self
            .embedder
            .embed_batch(&[question.to_string()])
            .await
            .map_err(Error::into_retrieval)?;
        let q_vec = vectors.pop().ok_or_else(|| Error::Retrieval("embedder returned no vector for the question".to_string()))?;
        let hits = engine.search_vec(&q_vec, self.top_k).await?;
        debug!("Retrieved {} chunk(s): {:?}", hits.len(), hits.iter().map(|h| h.position).collect::<Vec<_>>());
        Ok(hits)
    }

    /// Answer `question` from the indexed documents. The generator's text is
    /// returned unchanged.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let hits = self.retrieve(question).await?;
        if hits.is_empty() {
            info!("No context retrieved; answering with the sentinel");
            return Ok(NOT_IN_CONTEXT.to_string());
        }
        let context = hits.iter().map(|h| h.text.as_str()).collect::<Vec<_>>().join("\n\n");
        let request = GenerationRequest::new().text(build_prompt(&context, question));
        info!("Asking {} with {} context chunk(s)", self.generator.model_id(), hits.len());
        self.generator.generate(&request).await
    }
}
