use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, Int64Array, RecordBatch, UInt64Array};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use kbsearch_core::config::VectorSettings;
use kbsearch_core::traits::VectorIndex;
use kbsearch_core::types::{Candidate, ChunkId};

use crate::schema::CHUNK_ID_COLUMN;
use crate::table::open_db;

/// LanceDB table searched by inner product.
///
/// The pipeline is synchronous, so the index owns a runtime and blocks on
/// each query. `Runtime::block_on` takes `&self`, so concurrent callers are fine.
pub struct LanceVectorIndex {
	runtime: Runtime,
	table: Table,
	nprobes: usize,
	refine_factor: Option<u32>,
}

impl LanceVectorIndex {
	pub fn open(db_path: &Path, settings: &VectorSettings) -> Result<Self> {
		let runtime = Runtime::new()?;
		let uri = db_path.to_string_lossy().to_string();
		let table = runtime.block_on(async {
			let db = open_db(&uri).await?;
			db.open_table(&settings.table).execute().await.map_err(|e| anyhow!("Failed to open vector table '{}' at {}: {}", settings.table, uri, e))
		})?;
		let rows = runtime.block_on(table.count_rows(None))?;
		info!(path = %uri, table = %settings.table, rows, "vector index opened");
		Ok(Self { runtime, table, nprobes: settings.nprobes, refine_factor: settings.refine_factor })
	}

	async fn nearest(&self, query_vec: &[f32], n: usize) -> Result<Vec<Candidate>> {
		let mut query = self
			.table
			.vector_search(query_vec.to_vec())?
			.distance_type(DistanceType::Dot)
			.nprobes(self.nprobes)
			.limit(n)
			.select(Select::columns(&[CHUNK_ID_COLUMN]));
		if let Some(factor) = self.refine_factor { query = query.refine_factor(factor); }
		let mut stream = query.execute().await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? { read_hits(&batch, &mut hits)?; }
		Ok(hits)
	}
}

/// Dot distance is `1 - <q, v>`; convert back to similarity.
fn read_hits(batch: &RecordBatch, hits: &mut Vec<Candidate>) -> Result<()> {
	let distances = batch
		.column_by_name("_distance")
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
		.ok_or_else(|| anyhow!("vector search result has no _distance column"))?;
	let ids = batch.column_by_name(CHUNK_ID_COLUMN).ok_or_else(|| anyhow!("vector search result has no {} column", CHUNK_ID_COLUMN))?;
	let id_at = |i: usize| -> Option<ChunkId> {
		if let Some(col) = ids.as_any().downcast_ref::<Int64Array>() { return u64::try_from(col.value(i)).ok(); }
		ids.as_any().downcast_ref::<UInt64Array>().map(|col| col.value(i))
	};
	for i in 0..batch.num_rows() {
		if ids.is_null(i) { continue; }
		let id = id_at(i).ok_or_else(|| anyhow!("unsupported {} column type {:?}", CHUNK_ID_COLUMN, ids.data_type()))?;
		hits.push(Candidate::new(id, 1.0 - distances.value(i)));
	}
	Ok(())
}

impl VectorIndex for LanceVectorIndex {
	fn search_vec(&self, query_vec: &[f32], n: usize) -> Result<Vec<Candidate>> {
		if n == 0 { return Ok(vec![]); }
		let hits = self.runtime.block_on(self.nearest(query_vec, n))?;
		debug!(hits = hits.len(), "vector search");
		Ok(hits)
	}
}
