use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const CHUNK_ID_COLUMN: &str = "chunk_id";
pub const VECTOR_COLUMN: &str = "vector";

/// Serving table layout: one normalized vector per chunk.
pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(CHUNK_ID_COLUMN, DataType::Int64, false),
		Field::new(VECTOR_COLUMN, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
