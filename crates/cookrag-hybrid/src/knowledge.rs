//! Serving snapshot of the corpus and the handle that swaps it on reload.
//!
//! A [`KnowledgeBase`] is immutable once built. Readers clone the current
//! `Arc` and keep using it for the whole query; a reload builds a complete
//! replacement off to the side and then swaps the pointer, so no reader ever
//! sees a half-built index. Reloads are serialized by a writer lock.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::info;

use cookrag_core::types::ParentDocument;
use cookrag_core::DocumentStore;

use crate::fusion::RankedResult;
use crate::parents::resolve_parents;
use crate::retrieval::HybridRetriever;

pub struct KnowledgeBase {
    store: DocumentStore,
    retriever: HybridRetriever,
}

impl KnowledgeBase {
    /// Freezes `store`; `retriever` should already index its chunks.
    pub fn new(mut store: DocumentStore, retriever: HybridRetriever) -> cookrag_core::Result<Self> {
        store.mark_indexed()?;
        Ok(Self { store, retriever })
    }

    pub fn store(&self) -> &DocumentStore { &self.store }

    pub fn retriever(&self) -> &HybridRetriever { &self.retriever }

    pub fn resolve_parents(&self, results: &[RankedResult]) -> cookrag_core::Result<Vec<Arc<ParentDocument>>> {
        resolve_parents(&self.store, results.iter().map(|r| r.chunk.as_ref()))
    }
}

pub struct KnowledgeHandle {
    current: RwLock<Arc<KnowledgeBase>>,
    writer: Mutex<()>,
}

impl KnowledgeHandle {
    pub fn new(knowledge: KnowledgeBase) -> Self {
        Self { current: RwLock::new(Arc::new(knowledge)), writer: Mutex::new(()) }
    }

    pub fn current(&self) -> Arc<KnowledgeBase> { Arc::clone(&self.current.read()) }

    /// Installs `knowledge` and returns the snapshot it replaced.
    pub fn swap(&self, knowledge: KnowledgeBase) -> Arc<KnowledgeBase> {
        let _writer = self.writer.lock();
        self.install(knowledge)
    }

    fn install(&self, knowledge: KnowledgeBase) -> Arc<KnowledgeBase> {
        let next = Arc::new(knowledge);
        let previous = std::mem::replace(&mut *self.current.write(), next);
        info!(documents = self.current.read().store.parent_count(), "knowledge base swapped");
        previous
    }

    /// Runs `build` under the writer lock and installs its result. On error
    /// the current snapshot stays in place.
    pub fn rebuild<F>(&self, build: F) -> anyhow::Result<()>
    where
        F: FnOnce() -> anyhow::Result<KnowledgeBase>,
    {
        let _writer = self.writer.lock();
        let knowledge = build()?;
        self.install(knowledge);
        Ok(())
    }
}
