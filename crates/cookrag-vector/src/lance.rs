use anyhow::{anyhow, bail, Result};
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::query::ExecutableQuery;
use lancedb::{connect, Connection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use cookrag_core::traits::VectorIndexer;
use cookrag_core::types::{Category, ChildChunk, ChunkRef, Difficulty, DocMetadata, HeaderPath};

use crate::flat::FlatVectorIndex;
use crate::schema::{build_chunk_schema, CHUNKS_TABLE};

const INSERT_BATCH: usize = 1000;

/// Chunk table persisted under `db_path`.
pub struct LanceVectorStore { db: Connection, db_path: PathBuf, table_name: String }

impl LanceVectorStore {
	/// Opens (or lazily creates) the database at `db_path` without touching existing data.
	pub async fn open(db_path: &Path) -> Result<Self> {
		let db = connect(db_path.to_string_lossy().as_ref()).execute().await?;
		Ok(Self { db, db_path: db_path.to_path_buf(), table_name: CHUNKS_TABLE.to_string() })
	}

	/// Wipes `db_path` and opens an empty database there.
	pub async fn create(db_path: &Path) -> Result<Self> {
		if db_path.exists() { std::fs::remove_dir_all(db_path)?; }
		std::fs::create_dir_all(db_path)?;
		Self::open(db_path).await
	}

	pub fn path(&self) -> &Path { &self.db_path }

	pub async fn exists(&self) -> Result<bool> {
		Ok(self.db.table_names().execute().await?.contains(&self.table_name))
	}

	/// Writes every chunk with its embedding. Existing rows are kept; call on a
	/// store from [`LanceVectorStore::create`] to replace a saved index.
	pub async fn save(&self, entries: &[(ChunkRef, Vec<f32>)]) -> Result<()> {
		if entries.is_empty() { bail!("refusing to save an empty vector index"); }
		let dim = entries[0].1.len();
		if let Some((c, v)) = entries.iter().find(|(_, v)| v.len() != dim) { bail!("chunk {} has embedding width {}, expected {}", c.chunk_id, v.len(), dim); }
		info!(chunks = entries.len(), table = %self.table_name, "saving vector index");
		let pb = ProgressBar::new(entries.len() as u64);
		pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?.progress_chars("#>-"));
		for batch in entries.chunks(INSERT_BATCH) {
			self.insert_batch(batch, dim as i32).await?;
			pb.inc(batch.len() as u64);
		}
		pb.finish_with_message("saved");
		Ok(())
	}

	/// Convenience over [`save`](Self::save) for a populated [`FlatVectorIndex`].
	pub async fn save_index(&self, index: &FlatVectorIndex) -> Result<()> { self.save(&index.snapshot()).await }

	async fn insert_batch(&self, entries: &[(ChunkRef, Vec<f32>)], dim: i32) -> Result<()> {
		let record_batch = to_record_batch(entries, dim)?; let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		if self.exists().await? {
			self.db.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
		} else {
			self.db.create_table(&self.table_name, reader).execute().await?;
		}
		debug!(rows = entries.len(), "inserted batch");
		Ok(())
	}

	/// Reads every row back into an in-memory index. Chunks are rebuilt from
	/// the stored columns, so they are fresh allocations.
	pub async fn load(&self) -> Result<FlatVectorIndex> {
		let table = self.db.open_table(&self.table_name).execute().await?;
		let mut stream = table.query().execute().await?;
		let mut chunks = Vec::new(); let mut vectors = Vec::new();
		while let Some(batch) = TryStreamExt::try_next(&mut stream).await? {
			for (chunk, vector) in from_record_batch(&batch)? { chunks.push(chunk); vectors.push(vector); }
		}
		let index = FlatVectorIndex::new();
		index.index(&chunks, &vectors)?;
		info!(chunks = index.len(), path = %self.db_path.display(), "loaded vector index");
		Ok(index)
	}
}

fn to_record_batch(entries: &[(ChunkRef, Vec<f32>)], dim: i32) -> Result<RecordBatch> {
	let col = |f: fn(&ChildChunk) -> String| StringArray::from(entries.iter().map(|(c, _)| f(c)).collect::<Vec<_>>());
	let int = |f: fn(&ChildChunk) -> usize| Int64Array::from(entries.iter().map(|(c, _)| f(c) as i64).collect::<Vec<_>>());
	let h1: StringArray = entries.iter().map(|(c, _)| c.headers.h1.clone()).collect();
	let h2: StringArray = entries.iter().map(|(c, _)| c.headers.h2.clone()).collect();
	let vectors = entries.iter().map(|(_, v)| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
	let record_batch = RecordBatch::try_new(build_chunk_schema(dim), vec![
		Arc::new(col(|c| c.chunk_id.clone())),
		Arc::new(col(|c| c.parent_id.clone())),
		Arc::new(int(|c| c.chunk_index)),
		Arc::new(int(|c| c.batch_index)),
		Arc::new(int(|c| c.chunk_size)),
		Arc::new(col(|c| c.content.clone())),
		Arc::new(col(|c| c.metadata.source.clone())),
		Arc::new(col(|c| c.metadata.relative_path.clone())),
		Arc::new(col(|c| c.metadata.category.label().to_string())),
		Arc::new(col(|c| c.metadata.dish_name.clone())),
		Arc::new(col(|c| c.metadata.difficulty.label().to_string())),
		Arc::new(h1),
		Arc::new(h2),
		Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
	])?;
	Ok(record_batch)
}

fn strings<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("column {name} missing or not utf8"))
}

fn ints<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<Int64Array>()).ok_or_else(|| anyhow!("column {name} missing or not int64"))
}

fn opt_string(col: &StringArray, i: usize) -> Option<String> { if col.is_null(i) { None } else { Some(col.value(i).to_string()) } }

fn from_record_batch(batch: &RecordBatch) -> Result<Vec<(ChunkRef, Vec<f32>)>> {
	let chunk_id = strings(batch, "chunk_id")?; let parent_id = strings(batch, "parent_id")?;
	let chunk_index = ints(batch, "chunk_index")?; let batch_index = ints(batch, "batch_index")?; let chunk_size = ints(batch, "chunk_size")?;
	let content = strings(batch, "content")?; let source = strings(batch, "source")?; let relative_path = strings(batch, "relative_path")?;
	let category = strings(batch, "category")?; let dish_name = strings(batch, "dish_name")?; let difficulty = strings(batch, "difficulty")?;
	let h1 = strings(batch, "h1")?; let h2 = strings(batch, "h2")?;
	let vectors = batch.column_by_name("vector").and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>()).ok_or_else(|| anyhow!("column vector missing or not a fixed-size list"))?;

	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let values = vectors.value(i);
		let vector = values.as_any().downcast_ref::<Float32Array>().ok_or_else(|| anyhow!("vector items are not float32"))?.values().to_vec();
		let chunk = ChildChunk {
			chunk_id: chunk_id.value(i).to_string(),
			parent_id: parent_id.value(i).to_string(),
			chunk_index: chunk_index.value(i) as usize,
			batch_index: batch_index.value(i) as usize,
			content: content.value(i).to_string(),
			headers: HeaderPath { h1: opt_string(h1, i), h2: opt_string(h2, i) },
			metadata: DocMetadata {
				source: source.value(i).to_string(),
				relative_path: relative_path.value(i).to_string(),
				category: category.value(i).parse::<Category>()?,
				dish_name: dish_name.value(i).to_string(),
				difficulty: difficulty.value(i).parse::<Difficulty>()?,
			},
			chunk_size: chunk_size.value(i) as usize,
		};
		out.push((Arc::new(chunk), vector));
	}
	Ok(out)
}
