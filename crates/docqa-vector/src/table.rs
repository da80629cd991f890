//! LanceDB connection and metadata helpers.
//!
//! The `meta` table is a small key/value store written once per build. It
//! records which embedding model produced the vectors so a query with a
//! different model can be refused instead of silently mis-ranking.

use arrow_array::{Array, RecordBatch, RecordBatchIterator, RecordBatchReader, StringArray, TimestampMillisecondArray};
use arrow_schema::ArrowError;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::ExecutableQuery;
use lancedb::{connect, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::schema::{build_meta_schema, META_TABLE};

pub type LanceResult<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub async fn open_db(uri: &str) -> lancedb::Result<Connection> {
    connect(uri).execute().await
}

pub async fn has_table(conn: &Connection, name: &str) -> lancedb::Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|t| t == name))
}

/// Wrap record batches for `create_table`.
pub fn reader_for(batches: Vec<RecordBatch>, schema: Arc<arrow_schema::Schema>) -> Box<dyn RecordBatchReader + Send> {
    let items: Vec<Result<RecordBatch, ArrowError>> = batches.into_iter().map(Ok).collect();
    Box::new(RecordBatchIterator::new(items.into_iter(), schema))
}

/// Build parameters persisted alongside the vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub embedder_id: String,
    pub dim: usize,
    pub chunk_count: usize,
    pub built_at: String,
}

impl IndexMeta {
    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("embedder_id", self.embedder_id.clone()),
            ("dim", self.dim.to_string()),
            ("chunk_count", self.chunk_count.to_string()),
            ("built_at", self.built_at.clone()),
        ]
    }

    fn from_pairs(pairs: &HashMap<String, String>) -> Result<Self, String> {
        let get = |k: &str| pairs.get(k).cloned().ok_or_else(|| format!("meta key '{k}' missing"));
        let parse = |k: &str| -> Result<usize, String> {
            get(k)?.parse::<usize>().map_err(|e| format!("meta key '{k}': {e}"))
        };
        Ok(Self {
            embedder_id: get("embedder_id")?,
            dim: parse("dim")?,
            chunk_count: parse("chunk_count")?,
            built_at: get("built_at")?,
        })
    }
}

pub async fn write_meta(conn: &Connection, meta: &IndexMeta) -> LanceResult<()> {
    let pairs = meta.to_pairs();
    let now = Utc::now().timestamp_millis();
    let rb = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(pairs.iter().map(|(k, _)| k.to_string()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(pairs.iter().map(|(_, v)| v.clone()).collect::<Vec<_>>())),
            Arc::new(TimestampMillisecondArray::from(vec![now; pairs.len()])),
        ],
    )?;
    conn.create_table(META_TABLE, reader_for(vec![rb], build_meta_schema())).execute().await?;
    Ok(())
}

pub async fn read_meta(conn: &Connection) -> LanceResult<IndexMeta> {
    let t = conn.open_table(META_TABLE).execute().await?;
    let mut pairs = HashMap::new();
    let mut stream = t.query().execute().await?;
    while let Some(batch) = stream.try_next().await? {
        let key = batch.column_by_name("key").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or("meta.key column missing")?;
        let value = batch.column_by_name("value").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or("meta.value column missing")?;
        for i in 0..batch.num_rows() {
            if key.is_valid(i) && value.is_valid(i) {
                pairs.insert(key.value(i).to_string(), value.value(i).to_string());
            }
        }
    }
    Ok(IndexMeta::from_pairs(&pairs)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_pairs_round_trip() {
        let meta = IndexMeta { embedder_id: "fake:d8".into(), dim: 8, chunk_count: 3, built_at: "now".into() };
        let pairs: HashMap<String, String> = meta.to_pairs().into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        assert_eq!(IndexMeta::from_pairs(&pairs).unwrap(), meta);
    }

    #[test]
    fn missing_meta_key_is_reported() {
        let pairs = HashMap::from([("dim".to_string(), "8".to_string())]);
        let err = IndexMeta::from_pairs(&pairs).unwrap_err();
        assert!(err.contains("embedder_id"));
    }
}
