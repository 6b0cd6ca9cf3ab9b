use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info, warn};

use cookrag_core::traits::TextIndexer;
use cookrag_core::types::ChunkRef;

use crate::analyzer::analyze;
use crate::tantivy_utils::{build_schema, register_tokenizer, TERMS_TOKENIZER};

/// BM25 index over child chunks. Each document stores the ordinal of its
/// chunk so hits map straight back to the shared `ChunkRef`.
pub struct TantivyChunkIndex {
	index: Index,
	reader: IndexReader,
	ord_field: Field,
	chunk_id_field: Field,
	terms_field: Field,
	analyzer: TextAnalyzer,
	chunks: RwLock<Vec<ChunkRef>>,
}

impl TantivyChunkIndex {
	pub fn in_ram() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	/// Creates a fresh on-disk index, wiping anything already at `index_dir`.
	pub fn in_dir(index_dir: PathBuf) -> Result<Self> {
		if index_dir.exists() { std::fs::remove_dir_all(&index_dir)?; }
		std::fs::create_dir_all(&index_dir)?;
		Self::from_index(Index::create_in_dir(&index_dir, build_schema())?)
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let schema = index.schema();
		let ord_field = schema.get_field("ord")?;
		let chunk_id_field = schema.get_field("chunk_id")?;
		let terms_field = schema.get_field("terms")?;
		let analyzer = index.tokenizers().get(TERMS_TOKENIZER).ok_or_else(|| anyhow!("tokenizer {TERMS_TOKENIZER} is not registered"))?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self { index, reader, ord_field, chunk_id_field, terms_field, analyzer, chunks: RwLock::new(Vec::new()) })
	}

	fn build_query(&self, query: &str) -> Option<BooleanQuery> {
		let mut seen = HashSet::new();
		let clauses: Vec<(Occur, Box<dyn Query>)> = analyze(&mut self.analyzer.clone(), query)
			.into_iter()
			.filter(|t| seen.insert(t.clone()))
			.map(|t| {
				let term = Term::from_field_text(self.terms_field, &t);
				(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
			})
			.collect();
		if clauses.is_empty() { None } else { Some(BooleanQuery::new(clauses)) }
	}
}

impl TextIndexer for TantivyChunkIndex {
	fn index(&self, chunks: &[ChunkRef]) -> Result<()> {
		let mut stored = self.chunks.write();
		let mut index_writer: IndexWriter = self.index.writer(50_000_000)?;
		let mut added = Vec::with_capacity(chunks.len());
		for c in chunks {
			let ord = (stored.len() + added.len()) as u64;
			let doc = doc!(
				self.ord_field => ord,
				self.chunk_id_field => c.chunk_id.clone(),
				self.terms_field => c.content.clone(),
			);
			index_writer.add_document(doc)?;
			added.push(Arc::clone(c));
		}
		index_writer.commit()?;
		self.reader.reload()?;
		stored.extend(added);
		info!(added = chunks.len(), total = stored.len(), "keyword index updated");
		Ok(())
	}

	fn search(&self, query: &str, k: usize) -> Result<Vec<ChunkRef>> {
		if k == 0 { return Ok(Vec::new()); }
		let Some(q) = self.build_query(query) else { return Ok(Vec::new()); };
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&q, &TopDocs::with_limit(k))?;
		let stored = self.chunks.read();
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let ord = doc.get_first(self.ord_field).and_then(|v| v.as_u64()).ok_or_else(|| anyhow!("indexed chunk without ordinal"))?;
			let chunk_id = doc.get_first(self.chunk_id_field).and_then(|v| v.as_str()).unwrap_or("");
			match stored.get(ord as usize) {
				Some(c) => { debug!(score, chunk_id, "keyword hit"); hits.push(Arc::clone(c)); }
				None => warn!(ord, chunk_id, "keyword hit outside the chunk table"),
			}
		}
		Ok(hits)
	}

	fn len(&self) -> usize { self.chunks.read().len() }
}
