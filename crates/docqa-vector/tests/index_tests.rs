use async_trait::async_trait;
use docqa_core::error::{Error, Result};
use docqa_core::traits::Embedder;
use docqa_core::types::TextChunk;
use docqa_embed::FakeEmbedder;
use docqa_vector::{build_index, LanceSearchEngine};

fn chunks(texts: &[&str]) -> Vec<TextChunk> {
    texts.iter().enumerate().map(|(i, t)| TextChunk { position: i, text: t.to_string() }).collect()
}

/// Claims one dimension and returns another.
struct LyingEmbedder;

#[async_trait]
impl Embedder for LyingEmbedder {
    fn model_id(&self) -> &str { "lying" }
    fn dim(&self) -> usize { 16 }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.5; 8]).collect())
    }
}

#[tokio::test]
async fn build_then_search_returns_nearest_chunk_first() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("pdf_index");
    let embedder = FakeEmbedder::new(256);
    let meta = build_index(
        &dir,
        &chunks(&["Alice scored 90 marks in physics", "Bob plays the violin every evening", "The weather was rainy"]),
        &embedder,
    )
    .await?;
    assert_eq!(meta.chunk_count, 3);
    assert_eq!(meta.embedder_id, "fake:xxhash64:d256");

    let engine = LanceSearchEngine::open(&dir).await?;
    assert_eq!(engine.meta(), &meta);
    let q = embedder.embed_text("How many marks did Alice score");
    let hits = engine.search_vec(&q, 2).await?;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].position, 0);
    assert!(hits[0].text.contains("Alice"));
    assert!(hits[0].score >= hits[1].score);
    Ok(())
}

#[tokio::test]
async fn rebuild_replaces_previous_chunks() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("idx");
    let embedder = FakeEmbedder::new(32);
    build_index(&dir, &chunks(&["old content about apples", "more old content"]), &embedder).await?;
    build_index(&dir, &chunks(&["new content about rockets"]), &embedder).await?;

    let engine = LanceSearchEngine::open(&dir).await?;
    assert_eq!(engine.meta().chunk_count, 1);
    let hits = engine.search_vec(&embedder.embed_text("apples"), 10).await?;
    assert_eq!(hits.len(), 1);
    assert!(hits[0].text.contains("rockets"));
    assert!(!tmp.path().join(".idx.staging").exists());
    assert!(!tmp.path().join(".idx.old").exists());
    Ok(())
}

#[tokio::test]
async fn failed_build_keeps_prior_index() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("idx");
    let embedder = FakeEmbedder::new(16);
    build_index(&dir, &chunks(&["kept chunk"]), &embedder).await?;

    let err = build_index(&dir, &chunks(&["replacement"]), &LyingEmbedder).await.unwrap_err();
    assert!(matches!(err, Error::IndexBuild(_)), "got {err:?}");

    let engine = LanceSearchEngine::open(&dir).await?;
    let hits = engine.search_vec(&embedder.embed_text("kept"), 4).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "kept chunk");
    Ok(())
}

#[tokio::test]
async fn empty_build_searches_to_nothing() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("idx");
    let embedder = FakeEmbedder::new(8);
    let meta = build_index(&dir, &[], &embedder).await?;
    assert_eq!(meta.chunk_count, 0);

    let engine = LanceSearchEngine::open(&dir).await?;
    assert!(engine.search_vec(&embedder.embed_text("anything"), 4).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_index_is_reported_and_not_created() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("never_built");
    let err = LanceSearchEngine::open(&dir).await.err().unwrap();
    assert!(matches!(err, Error::IndexNotFound(_)));
    assert!(!dir.exists());
}
