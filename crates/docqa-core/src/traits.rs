use async_trait::async_trait;

use crate::error::Result;
use crate::types::GenerationRequest;

/// Text → vector collaborator. Must be the same logical model at build and
/// query time; `model_id` is persisted with the index to enforce that.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `gemini:text-embedding-004`).
    fn model_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// Compute one vector per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Prompt → text collaborator.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_id(&self) -> &str;
    /// Return the generated text. Empty output is an error, never `Ok("")`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn model_id(&self) -> &str { (**self).model_id() }
    fn dim(&self) -> usize { (**self).dim() }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { (**self).embed_batch(texts).await }
}

#[async_trait]
impl<T: Generator + ?Sized> Generator for Box<T> {
    fn model_id(&self) -> &str { (**self).model_id() }
    async fn generate(&self, request: &GenerationRequest) -> Result<String> { (**self).generate(request).await }
}

#[async_trait]
impl<T: Generator + ?Sized> Generator for &T {
    fn model_id(&self) -> &str { (**self).model_id() }
    async fn generate(&self, request: &GenerationRequest) -> Result<String> { (**self).generate(request).await }
}
