use anyhow::{bail, Result};
use parking_lot::RwLock;

use cookrag_core::traits::VectorIndexer;
use cookrag_core::types::ChunkRef;

/// Exhaustive cosine search over every stored embedding.
#[derive(Default)]
pub struct FlatVectorIndex { entries: RwLock<Vec<(ChunkRef, Vec<f32>)>> }

impl FlatVectorIndex {
	pub fn new() -> Self { Self::default() }

	/// Copies out every `(chunk, embedding)` pair in insertion order.
	pub fn snapshot(&self) -> Vec<(ChunkRef, Vec<f32>)> { self.entries.read().clone() }

	pub fn dim(&self) -> Option<usize> { self.entries.read().first().map(|(_, v)| v.len()) }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
	if na == 0.0 || nb == 0.0 { return 0.0; }
	dot / (na * nb)
}

impl VectorIndexer for FlatVectorIndex {
	fn index(&self, chunks: &[ChunkRef], embeddings: &[Vec<f32>]) -> Result<()> {
		if chunks.len() != embeddings.len() { bail!("{} chunks but {} embeddings", chunks.len(), embeddings.len()); }
		let mut entries = self.entries.write();
		let dim = entries.first().map(|(_, v)| v.len()).or_else(|| embeddings.first().map(Vec::len));
		if let Some(dim) = dim {
			if let Some(bad) = embeddings.iter().find(|v| v.len() != dim) { bail!("embedding width {} does not match index width {}", bad.len(), dim); }
		}
		entries.extend(chunks.iter().cloned().zip(embeddings.iter().cloned()));
		Ok(())
	}

	fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<ChunkRef>> {
		if k == 0 { return Ok(Vec::new()); }
		let entries = self.entries.read();
		if let Some((_, first)) = entries.first() {
			if first.len() != query_vec.len() { bail!("query width {} does not match index width {}", query_vec.len(), first.len()); }
		}
		let mut scored: Vec<(f32, &ChunkRef)> = entries.iter().map(|(c, v)| (cosine(query_vec, v), c)).collect();
		// stable: equal scores keep insertion order
		scored.sort_by(|a, b| b.0.total_cmp(&a.0));
		Ok(scored.into_iter().take(k).map(|(_, c)| c.clone()).collect())
	}

	fn len(&self) -> usize { self.entries.read().len() }
}

#[cfg(test)]
mod tests {
	use super::*;
	use cookrag_core::data_processor::DataProcessor;
	use std::sync::Arc;

	fn chunks(n: usize) -> Vec<ChunkRef> {
		let p = DataProcessor::new();
		let docs: Vec<_> = (0..n).map(|i| p.document_from_markdown(&format!("soup/{i}.md"), "x", format!("# 汤{i}\n\n内容{i}"))).collect();
		p.chunk_documents(&docs).unwrap().into_iter().map(Arc::new).collect()
	}

	#[test]
	fn nearest_first_and_ties_keep_insertion_order() {
		let cs = chunks(3);
		let idx = FlatVectorIndex::new();
		idx.index(&cs, &[vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 0.0]]).unwrap();
		let hits = idx.search_vec(&[1.0, 0.0], 3).unwrap();
		assert!(Arc::ptr_eq(&hits[0], &cs[1]));
		assert!(Arc::ptr_eq(&hits[1], &cs[2]));
		assert!(Arc::ptr_eq(&hits[2], &cs[0]));
		assert_eq!(idx.search_vec(&[1.0, 0.0], 1).unwrap().len(), 1);
	}

	#[test]
	fn mismatched_inputs_are_rejected() {
		let cs = chunks(2);
		let idx = FlatVectorIndex::new();
		assert!(idx.index(&cs, &[vec![1.0]]).is_err());
		idx.index(&cs, &[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
		assert!(idx.search_vec(&[1.0, 0.0, 0.0], 1).is_err());
		assert!(idx.search_vec(&[1.0, 0.0], 0).unwrap().is_empty());
	}
}
