//! Embedding collaborators: the hosted Gemini model and a deterministic
//! hashing stand-in for tests and offline development.

use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use tracing::{debug, info};
use twox_hash::XxHash64;

use docqa_core::config::GenAiSettings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::Embedder;
use docqa_genai::embed::MAX_BATCH;
use docqa_genai::GeminiClient;

pub struct GeminiEmbedder {
    client: GeminiClient,
    model: String,
    id: String,
    dim: usize,
}

impl GeminiEmbedder {
    pub fn new(client: GeminiClient, model: &str, dim: usize) -> Self {
        let id = format!("gemini:{}:d{}", model.trim_start_matches("models/"), dim);
        info!("Embedder configured: {}", id);
        Self { client, model: model.to_string(), id, dim }
    }

    pub fn from_settings(settings: &GenAiSettings) -> Result<Self> {
        Ok(Self::new(GeminiClient::new(settings)?, &settings.embedding_model, settings.embedding_dim))
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(MAX_BATCH).enumerate() {
            debug!("Embedding batch {} ({} texts)", i + 1, batch.len());
            for v in self.client.batch_embed(&self.model, batch).await? {
                if v.len() != self.dim {
                    return Err(Error::Generation(format!(
                        "embedding has dimension {}, expected {}",
                        v.len(),
                        self.dim
                    )));
                }
                out.push(v);
            }
        }
        Ok(out)
    }
}

/// Bag-of-words feature hashing into `dim` buckets, L2-normalised.
///
/// Identical text always yields an identical vector, and texts sharing words
/// land close together, which is all retrieval tests need.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self::with_id(dim, format!("fake:xxhash64:d{dim}")) }

    pub fn with_id(dim: usize, id: impl Into<String>) -> Self { Self { dim, id: id.into() } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase);
        for (i, token) in words.enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 1.0 + val + (i as f32 % 3.0) * 0.01;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[0] = 1.0;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// The embedder selected by settings. `APP_USE_FAKE_EMBEDDINGS=1` switches to
/// [`FakeEmbedder`] so development runs need neither network nor API key.
pub fn get_default_embedder(settings: &GenAiSettings) -> Result<Box<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake {
        info!("Using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(settings.embedding_dim)));
    }
    Ok(Box::new(GeminiEmbedder::from_settings(settings)?))
}
