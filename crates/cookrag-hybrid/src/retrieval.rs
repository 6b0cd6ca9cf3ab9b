use anyhow::Result;
use tracing::{debug, info};

use cookrag_core::config::RagConfig;
use cookrag_core::traits::{Embedder, TextIndexer, VectorIndexer};
use cookrag_core::types::ChunkRef;
use cookrag_core::Error;

use crate::filter::{candidate_budget, filter_ranked, FilterPredicates};
use crate::fusion::{fuse, RankedResult};

/// Dense and sparse retrievers over the same chunk set, fused with RRF.
pub struct HybridRetriever {
    text: Box<dyn TextIndexer>,
    vector: Box<dyn VectorIndexer>,
    embedder: Box<dyn Embedder>,
    retriever_k: usize,
    over_fetch_factor: usize,
}

impl HybridRetriever {
    pub fn new(text: Box<dyn TextIndexer>, vector: Box<dyn VectorIndexer>, embedder: Box<dyn Embedder>, config: &RagConfig) -> Self {
        Self { text, vector, embedder, retriever_k: config.retriever_k, over_fetch_factor: config.over_fetch_factor }
    }

    pub fn index(&self, chunks: &[ChunkRef]) -> Result<()> {
        self.index_dense(chunks)?;
        self.index_sparse(chunks)
    }

    /// Embeds and indexes `chunks`, returning the embeddings so they can be persisted.
    pub fn index_dense(&self, chunks: &[ChunkRef]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.embedder.dim()) {
            anyhow::bail!("embedder produced width {} but reports {}", bad.len(), self.embedder.dim());
        }
        self.vector.index(chunks, &embeddings)?;
        info!(chunks = chunks.len(), dim = self.embedder.dim(), "dense index built");
        Ok(embeddings)
    }

    pub fn index_sparse(&self, chunks: &[ChunkRef]) -> Result<()> {
        self.text.index(chunks)?;
        info!(chunks = chunks.len(), "sparse index built");
        Ok(())
    }

    pub fn dense_search(&self, query: &str, k: usize) -> Result<Vec<ChunkRef>> {
        let query_vec = self.embedder.embed_query(query)?;
        self.vector.search_vec(&query_vec, k)
    }

    pub fn sparse_search(&self, query: &str, k: usize) -> Result<Vec<ChunkRef>> { self.text.search(query, k) }

    fn ensure_indexed(&self) -> Result<()> {
        if self.text.is_empty() && self.vector.is_empty() {
            return Err(Error::EmptyCorpus("no chunks have been indexed").into());
        }
        Ok(())
    }

    /// Top `top_k` chunks by RRF over both retrievers, smoothed with `top_k`.
    pub fn hybrid_search(&self, query: &str, top_k: usize) -> Result<Vec<RankedResult>> {
        self.ensure_indexed()?;
        let fetch = self.retriever_k.max(top_k);
        let dense = self.dense_search(query, fetch)?;
        let sparse = self.sparse_search(query, fetch)?;
        debug!(query, fetch, dense = dense.len(), sparse = sparse.len(), "retrieved candidates");
        let mut fused = fuse(&dense, &sparse, top_k);
        fused.truncate(top_k);
        Ok(fused)
    }

    /// Hybrid search over `top_k * over_fetch_factor` candidates, filtered down to `top_k`.
    pub fn metadata_filtered_search(&self, query: &str, predicates: &FilterPredicates, top_k: usize) -> Result<Vec<RankedResult>> {
        let candidates = self.hybrid_search(query, candidate_budget(top_k, self.over_fetch_factor))?;
        Ok(filter_ranked(&candidates, predicates, top_k, self.over_fetch_factor))
    }

    pub fn len(&self) -> usize { self.text.len().max(self.vector.len()) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}
