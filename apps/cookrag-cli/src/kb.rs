use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

use cookrag_core::config::RagConfig;
use cookrag_core::data_processor::DataProcessor;
use cookrag_core::traits::{Embedder, VectorIndexer};
use cookrag_core::types::ChunkRef;
use cookrag_core::DocumentStore;
use cookrag_embed::get_default_embedder;
use cookrag_hybrid::{HybridRetriever, KnowledgeBase};
use cookrag_text::TantivyChunkIndex;
use cookrag_vector::{FlatVectorIndex, LanceVectorStore};

/// Loads and chunks every recipe under the configured data directory.
pub fn ingest_store(config: &RagConfig, base: &Path) -> Result<DocumentStore> {
    let data_dir = config.data_dir(base);
    info!(dir = %data_dir.display(), "ingesting recipes");
    DataProcessor::new().ingest_directory(&data_dir)
}

fn embed_and_index(chunks: &[ChunkRef], embedder: &dyn Embedder) -> Result<FlatVectorIndex> {
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = embedder.embed_batch(&texts)?;
    let index = FlatVectorIndex::new();
    index.index(chunks, &embeddings)?;
    Ok(index)
}

async fn load_or_build(index_dir: &Path, chunks: &[ChunkRef], embedder: &dyn Embedder) -> Result<FlatVectorIndex> {
    let saved = LanceVectorStore::open(index_dir).await?;
    if saved.exists().await? {
        let index = saved.load().await?;
        if index.dim() == Some(embedder.dim()) { return Ok(index); }
        warn!(saved = ?index.dim(), embedder = embedder.dim(), "saved vector index has a different width, rebuilding");
    }
    let index = embed_and_index(chunks, embedder)?;
    LanceVectorStore::create(index_dir).await?.save_index(&index).await?;
    Ok(index)
}

/// Ingests the corpus, loads the saved vector index (building and saving it
/// when missing), and indexes the chunks for keyword search.
pub fn build_knowledge(config: &RagConfig, base: &Path) -> Result<KnowledgeBase> {
    let store = ingest_store(config, base)?;
    let embedder = get_default_embedder(config.model_dir(base).as_deref())?;
    let index_dir = config.index_dir(base);
    let vector = tokio::runtime::Runtime::new()?.block_on(load_or_build(&index_dir, store.chunks(), embedder.as_ref()))?;
    let retriever = HybridRetriever::new(Box::new(TantivyChunkIndex::in_ram()?), Box::new(vector), embedder, config);
    retriever.index_sparse(store.chunks())?;
    info!(documents = store.parent_count(), chunks = store.chunk_count(), "knowledge base ready");
    Ok(KnowledgeBase::new(store, retriever)?)
}

/// Re-embeds the whole corpus and replaces the saved vector index. Returns
/// the number of chunks written.
pub fn rebuild_vector_index(config: &RagConfig, base: &Path) -> Result<usize> {
    let store = ingest_store(config, base)?;
    let embedder = get_default_embedder(config.model_dir(base).as_deref())?;
    let index = embed_and_index(store.chunks(), embedder.as_ref())?;
    let index_dir = config.index_dir(base);
    tokio::runtime::Runtime::new()?.block_on(async {
        LanceVectorStore::create(&index_dir).await?.save_index(&index).await
    })?;
    Ok(index.len())
}
