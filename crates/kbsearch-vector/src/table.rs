//! LanceDB connection helpers and a bulk writer for the serving table.

use anyhow::{anyhow, Result};
use arrow_array::{FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator};
use lancedb::{connect, Connection};
use std::sync::Arc;

use kbsearch_core::types::ChunkId;

use crate::schema::build_arrow_schema;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

/// Create (or append to) `table` with `(chunk_id, vector)` rows.
pub async fn write_vectors(conn: &Connection, table: &str, rows: &[(ChunkId, Vec<f32>)]) -> Result<()> {
    let Some((_, first)) = rows.first() else { return Ok(()) };
    let dim = first.len();
    if let Some((id, bad)) = rows.iter().find(|(_, v)| v.len() != dim) {
        return Err(anyhow!("vector for chunk {} has {} dims, expected {}", id, bad.len(), dim));
    }
    let dim = i32::try_from(dim)?;
    let schema = build_arrow_schema(dim);
    let ids = rows.iter().map(|(id, _)| i64::try_from(*id)).collect::<std::result::Result<Vec<i64>, _>>()?;
    let vectors = rows.iter().map(|(_, v)| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
        ],
    )?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    if conn.table_names().execute().await?.iter().any(|n| n == table) {
        conn.open_table(table).execute().await?.add(reader).execute().await?;
    } else {
        conn.create_table(table, reader).execute().await?;
    }
    Ok(())
}
