use arrow_array::{Array, Float32Array, Int32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use std::path::Path;
use tracing::debug;

use docqa_core::error::{Error, Result};
use docqa_core::types::SearchHit;

use crate::schema::{CHUNKS_TABLE, META_TABLE};
use crate::table::{has_table, open_db, read_meta, IndexMeta};

/// Read side of a built index.
pub struct LanceSearchEngine {
    db: Connection,
    meta: IndexMeta,
}

impl LanceSearchEngine {
    /// Open the index at `dir`. Fails with [`Error::IndexNotFound`] when no
    /// complete build exists there.
    pub async fn open(dir: &Path) -> Result<Self> {
        let not_found = || Error::IndexNotFound(dir.display().to_string());
        // connect() would create the directory
        if !dir.is_dir() {
            return Err(not_found());
        }
        let db = open_db(dir.to_string_lossy().as_ref()).await.map_err(retrieval_err)?;
        for name in [CHUNKS_TABLE, META_TABLE] {
            if !has_table(&db, name).await.map_err(retrieval_err)? {
                return Err(not_found());
            }
        }
        let meta = read_meta(&db).await.map_err(retrieval_err)?;
        debug!("Opened index {} ({} chunks, {})", dir.display(), meta.chunk_count, meta.embedder_id);
        Ok(Self { db, meta })
    }

    pub fn meta(&self) -> &IndexMeta { &self.meta }

    /// The `k` chunks nearest to `q_vec` by cosine distance, best first.
    pub async fn search_vec(&self, q_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if q_vec.len() != self.meta.dim {
            return Err(Error::Retrieval(format!(
                "query vector has dimension {}, index expects {}",
                q_vec.len(),
                self.meta.dim
            )));
        }
        let table = self.db.open_table(CHUNKS_TABLE).execute().await.map_err(retrieval_err)?;
        if k == 0 || table.count_rows(None).await.map_err(retrieval_err)? == 0 {
            return Ok(Vec::new());
        }
        let mut stream = table
            .vector_search(q_vec.to_vec())
            .map_err(retrieval_err)?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(retrieval_err)?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(retrieval_err)? {
            read_hits(&batch, &mut hits)?;
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.position.cmp(&b.position)));
        hits.truncate(k);
        Ok(hits)
    }
}

fn read_hits(batch: &RecordBatch, hits: &mut Vec<SearchHit>) -> Result<()> {
    let column = |name: &str| {
        batch.column_by_name(name).ok_or_else(|| Error::Retrieval(format!("search result has no '{name}' column")))
    };
    let positions = column("position")?
        .as_any()
        .downcast_ref::<Int32Array>()
        .ok_or_else(|| Error::Retrieval("'position' column is not Int32".to_string()))?;
    let texts = column("text")?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::Retrieval("'text' column is not Utf8".to_string()))?;
    let distances = column("_distance")?
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| Error::Retrieval("'_distance' column is not Float32".to_string()))?;
    for i in 0..batch.num_rows() {
        if !texts.is_valid(i) {
            continue;
        }
        hits.push(SearchHit {
            position: positions.value(i).max(0) as usize,
            text: texts.value(i).to_string(),
            score: 1.0 - distances.value(i),
        });
    }
    Ok(())
}

fn retrieval_err(e: impl std::fmt::Display) -> Error { Error::Retrieval(e.to_string()) }
