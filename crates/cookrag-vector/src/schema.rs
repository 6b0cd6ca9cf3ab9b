use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const CHUNKS_TABLE: &str = "recipe_chunks";

/// One row per child chunk plus its embedding of width `dim`.
pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("chunk_id", DataType::Utf8, false),
		Field::new("parent_id", DataType::Utf8, false),
		Field::new("chunk_index", DataType::Int64, false),
		Field::new("batch_index", DataType::Int64, false),
		Field::new("chunk_size", DataType::Int64, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("source", DataType::Utf8, false),
		Field::new("relative_path", DataType::Utf8, false),
		Field::new("category", DataType::Utf8, false),
		Field::new("dish_name", DataType::Utf8, false),
		Field::new("difficulty", DataType::Utf8, false),
		Field::new("h1", DataType::Utf8, true),
		Field::new("h2", DataType::Utf8, true),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
