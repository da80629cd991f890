use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, StringArray};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use docqa_core::error::{Error, Result};
use docqa_core::traits::Embedder;
use docqa_core::types::TextChunk;

use crate::schema::{build_chunk_schema, CHUNKS_TABLE};
use crate::table::{open_db, reader_for, write_meta, IndexMeta};

const INSERT_BATCH: usize = 1000;

/// Embed `chunks` and persist them as a fresh index at `dir`.
///
/// The index is written to a staging directory next to `dir` and only moved
/// into place once complete, so a failed build leaves any previous index
/// untouched and a successful one replaces it entirely.
pub async fn build_index<E>(dir: &Path, chunks: &[TextChunk], embedder: &E) -> Result<IndexMeta>
where
    E: Embedder + ?Sized,
{
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = if texts.is_empty() {
        Vec::new()
    } else {
        embedder.embed_batch(&texts).await.map_err(Error::into_build)?
    };
    validate_embeddings(&embeddings, chunks.len(), embedder.dim())?;

    let meta = IndexMeta {
        embedder_id: embedder.model_id().to_string(),
        dim: embedder.dim(),
        chunk_count: chunks.len(),
        built_at: Utc::now().to_rfc3339(),
    };
    let staging = sibling(dir, "staging")?;
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(build_err)?;
    }
    if let Some(parent) = staging.parent() {
        fs::create_dir_all(parent).map_err(build_err)?;
    }
    let written = async {
        let indexer = LanceDbIndexer::new(&staging, meta.dim).await?;
        indexer.index(chunks, &embeddings).await?;
        indexer.finish(&meta).await
    }
    .await;
    if let Err(e) = written {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }
    swap_into_place(&staging, dir)?;
    info!("Index at {} now holds {} chunks ({})", dir.display(), meta.chunk_count, meta.embedder_id);
    Ok(meta)
}

fn validate_embeddings(embeddings: &[Vec<f32>], expected: usize, dim: usize) -> Result<()> {
    if embeddings.len() != expected {
        return Err(Error::IndexBuild(format!("embedder returned {} vectors for {} chunks", embeddings.len(), expected)));
    }
    if let Some((i, v)) = embeddings.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(Error::IndexBuild(format!("vector {} has dimension {}, expected {}", i, v.len(), dim)));
    }
    if let Some(i) = embeddings.iter().position(|v| v.iter().any(|x| !x.is_finite())) {
        return Err(Error::IndexBuild(format!("vector {i} contains non-finite values")));
    }
    Ok(())
}

/// `dir` with its final component renamed to `.<name>.<suffix>`.
fn sibling(dir: &Path, suffix: &str) -> Result<PathBuf> {
    let name = dir
        .file_name()
        .ok_or_else(|| Error::InvalidConfig(format!("index path {} has no final component", dir.display())))?;
    Ok(dir.with_file_name(format!(".{}.{}", name.to_string_lossy(), suffix)))
}

/// Replace `target` with `staging`. The old index is moved aside first and
/// restored if the final rename fails.
fn swap_into_place(staging: &Path, target: &Path) -> Result<()> {
    let backup = sibling(target, "old")?;
    if backup.exists() {
        fs::remove_dir_all(&backup).map_err(build_err)?;
    }
    let had_previous = target.exists();
    if had_previous {
        fs::rename(target, &backup).map_err(build_err)?;
    }
    if let Err(e) = fs::rename(staging, target) {
        if had_previous {
            let _ = fs::rename(&backup, target);
        }
        return Err(build_err(e));
    }
    if had_previous {
        fs::remove_dir_all(&backup).map_err(build_err)?;
    }
    debug!("Swapped {} into {}", staging.display(), target.display());
    Ok(())
}

fn build_err(e: impl std::fmt::Display) -> Error { Error::IndexBuild(e.to_string()) }

pub struct LanceDbIndexer {
    db: lancedb::Connection,
    dim: usize,
}

impl LanceDbIndexer {
    pub async fn new(db_path: &Path, dim: usize) -> Result<Self> {
        let db = open_db(db_path.to_string_lossy().as_ref()).await.map_err(build_err)?;
        Ok(Self { db, dim })
    }

    /// Write all rows to the `chunks` table in batches.
    pub async fn index(&self, chunks: &[TextChunk], embeddings: &[Vec<f32>]) -> Result<()> {
        validate_embeddings(embeddings, chunks.len(), self.dim)?;
        let schema = build_chunk_schema(self.dim_i32()?);
        if chunks.is_empty() {
            self.db.create_empty_table(CHUNKS_TABLE, schema).execute().await.map_err(build_err)?;
            return Ok(());
        }
        let pb = ProgressBar::new(chunks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        let mut batches = Vec::new();
        for (chunk_batch, emb_batch) in chunks.chunks(INSERT_BATCH).zip(embeddings.chunks(INSERT_BATCH)) {
            batches.push(self.to_record_batch(chunk_batch, emb_batch)?);
            pb.inc(chunk_batch.len() as u64);
        }
        self.db.create_table(CHUNKS_TABLE, reader_for(batches, schema)).execute().await.map_err(build_err)?;
        pb.finish_with_message("indexed");
        Ok(())
    }

    pub async fn finish(&self, meta: &IndexMeta) -> Result<()> {
        write_meta(&self.db, meta).await.map_err(build_err)
    }

    fn dim_i32(&self) -> Result<i32> {
        i32::try_from(self.dim).map_err(|_| Error::IndexBuild(format!("dimension {} too large", self.dim)))
    }

    fn to_record_batch(&self, chunks: &[TextChunk], embeddings: &[Vec<f32>]) -> Result<RecordBatch> {
        let dim = self.dim_i32()?;
        let positions = chunks
            .iter()
            .map(|c| i32::try_from(c.position).map_err(|_| Error::IndexBuild(format!("chunk position {} too large", c.position))))
            .collect::<Result<Vec<i32>>>()?;
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = embeddings.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
        RecordBatch::try_new(
            build_chunk_schema(dim),
            vec![
                Arc::new(Int32Array::from(positions)),
                Arc::new(StringArray::from(texts)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
            ],
        )
        .map_err(build_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_names_are_hidden_next_to_target() {
        let p = sibling(Path::new("/data/pdf_index"), "staging").unwrap();
        assert_eq!(p, PathBuf::from("/data/.pdf_index.staging"));
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let err = validate_embeddings(&[vec![0.0; 3]], 1, 4).unwrap_err();
        assert!(matches!(err, Error::IndexBuild(m) if m.contains("dimension 3")));
    }

    #[test]
    fn count_mismatch_is_rejected() {
        assert!(validate_embeddings(&[vec![0.0; 4]], 2, 4).is_err());
    }

    #[test]
    fn swap_replaces_previous_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let target = tmp.path().join("idx");
        let staging = tmp.path().join(".idx.staging");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("old.txt"), "old").unwrap();
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("new.txt"), "new").unwrap();

        swap_into_place(&staging, &target).unwrap();
        assert!(target.join("new.txt").exists());
        assert!(!target.join("old.txt").exists());
        assert!(!staging.exists());
        assert!(!tmp.path().join(".idx.old").exists());
    }
}
