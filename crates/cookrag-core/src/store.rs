//! In-memory corpus of parent documents and their child chunks.
//!
//! The store moves through `Empty -> Ingested -> Indexed`. Writes are only
//! accepted before it is marked indexed; a serving store is read-only and a
//! re-ingestion builds a fresh store that replaces it wholesale.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{Category, ChildChunk, ChunkId, ChunkRef, Difficulty, ParentDocument, ParentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum StoreState {
    #[default]
    Empty,
    Ingested,
    Indexed,
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreState::Empty => "empty",
            StoreState::Ingested => "ingested",
            StoreState::Indexed => "indexed",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CorpusStatistics {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub categories: BTreeMap<Category, usize>,
    pub difficulties: BTreeMap<Difficulty, usize>,
    pub avg_chunk_size: f64,
}

#[derive(Debug, Serialize)]
struct MetadataRecord<'a> {
    source: &'a str,
    dish_name: &'a str,
    category: Category,
    difficulty: Difficulty,
    content_length: usize,
}

#[derive(Debug, Default)]
pub struct DocumentStore {
    state: StoreState,
    parents: Vec<Arc<ParentDocument>>,
    parent_slots: HashMap<ParentId, usize>,
    chunks: Vec<ChunkRef>,
    chunk_slots: HashMap<ChunkId, usize>,
    parent_child_map: HashMap<ChunkId, ParentId>,
}

impl DocumentStore {
    pub fn new() -> Self { Self::default() }

    pub fn state(&self) -> StoreState { self.state }

    fn ensure_writable(&self, operation: &'static str) -> Result<()> {
        if self.state == StoreState::Indexed {
            return Err(Error::InvalidState { operation, state: self.state });
        }
        Ok(())
    }

    /// Inserts a parent. Re-inserting the same source path replaces the
    /// parent and retracts the chunks derived from its previous text.
    pub fn put_parent(&mut self, doc: ParentDocument) -> Result<()> {
        self.ensure_writable("insert a parent")?;
        match self.parent_slots.get(&doc.parent_id).copied() {
            Some(slot) => {
                let existing = &self.parents[slot];
                if existing.metadata.relative_path != doc.metadata.relative_path {
                    return Err(Error::DuplicateParent {
                        parent_id: doc.parent_id,
                        existing: existing.metadata.relative_path.clone(),
                        incoming: doc.metadata.relative_path,
                    });
                }
                let parent_id = doc.parent_id.clone();
                self.parents[slot] = Arc::new(doc);
                self.retract_chunks(&parent_id);
            }
            None => {
                self.parent_slots.insert(doc.parent_id.clone(), self.parents.len());
                self.parents.push(Arc::new(doc));
            }
        }
        self.state = StoreState::Ingested;
        Ok(())
    }

    fn retract_chunks(&mut self, parent_id: &str) {
        let before = self.chunks.len();
        self.chunks.retain(|c| c.parent_id != parent_id);
        if self.chunks.len() == before { return; }
        self.parent_child_map.retain(|_, p| p != parent_id);
        self.chunk_slots = self.chunks.iter().enumerate().map(|(i, c)| (c.chunk_id.clone(), i)).collect();
    }

    /// Appends chunks of an existing parent and records them in the parent-child map.
    pub fn put_chunks(&mut self, parent_id: &str, chunks: Vec<ChildChunk>) -> Result<()> {
        self.ensure_writable("insert chunks")?;
        if !self.parent_slots.contains_key(parent_id) {
            return Err(Error::UnknownParent(parent_id.to_string()));
        }
        for chunk in &chunks {
            if chunk.parent_id != parent_id {
                return Err(Error::Operation(format!(
                    "chunk {} belongs to parent {}, not {}",
                    chunk.chunk_id, chunk.parent_id, parent_id
                )));
            }
            if self.chunk_slots.contains_key(&chunk.chunk_id) {
                return Err(Error::Operation(format!("chunk {} already stored", chunk.chunk_id)));
            }
        }
        for chunk in chunks {
            self.chunk_slots.insert(chunk.chunk_id.clone(), self.chunks.len());
            self.parent_child_map.insert(chunk.chunk_id.clone(), chunk.parent_id.clone());
            self.chunks.push(Arc::new(chunk));
        }
        Ok(())
    }

    /// Freezes the store for serving. Requires at least one chunk.
    pub fn mark_indexed(&mut self) -> Result<()> {
        match self.state {
            StoreState::Empty => Err(Error::EmptyCorpus("nothing has been ingested")),
            StoreState::Indexed => Err(Error::InvalidState { operation: "mark the store indexed", state: self.state }),
            StoreState::Ingested if self.chunks.is_empty() => Err(Error::EmptyCorpus("no chunks to index")),
            StoreState::Ingested => {
                self.state = StoreState::Indexed;
                Ok(())
            }
        }
    }

    /// Fails with `EmptyCorpus` before any ingestion.
    pub fn require_ingested(&self) -> Result<()> {
        if self.state == StoreState::Empty {
            return Err(Error::EmptyCorpus("no documents have been ingested"));
        }
        Ok(())
    }

    pub fn get_parent(&self, parent_id: &str) -> Result<Arc<ParentDocument>> {
        self.parent_slots
            .get(parent_id)
            .map(|&slot| Arc::clone(&self.parents[slot]))
            .ok_or_else(|| Error::NotFound(format!("parent {parent_id}")))
    }

    pub fn get_chunk(&self, chunk_id: &str) -> Result<ChunkRef> {
        self.chunk_slots
            .get(chunk_id)
            .map(|&slot| Arc::clone(&self.chunks[slot]))
            .ok_or_else(|| Error::NotFound(format!("chunk {chunk_id}")))
    }

    pub fn parent_of(&self, chunk_id: &str) -> Option<&str> {
        self.parent_child_map.get(chunk_id).map(String::as_str)
    }

    pub fn children_of(&self, parent_id: &str) -> Vec<ChunkRef> {
        self.chunks.iter().filter(|c| c.parent_id == parent_id).cloned().collect()
    }

    pub fn list_by_category(&self, label: &str) -> Result<Vec<Arc<ParentDocument>>> {
        let category: Category = label.parse()?;
        Ok(self.parents.iter().filter(|p| p.metadata.category == category).cloned().collect())
    }

    pub fn list_by_difficulty(&self, label: &str) -> Result<Vec<Arc<ParentDocument>>> {
        let difficulty: Difficulty = label.parse()?;
        Ok(self.parents.iter().filter(|p| p.metadata.difficulty == difficulty).cloned().collect())
    }

    pub fn parents(&self) -> &[Arc<ParentDocument>] { &self.parents }

    pub fn chunks(&self) -> &[ChunkRef] { &self.chunks }

    pub fn parent_count(&self) -> usize { self.parents.len() }

    pub fn chunk_count(&self) -> usize { self.chunks.len() }

    pub fn statistics(&self) -> CorpusStatistics {
        let mut categories = BTreeMap::new();
        let mut difficulties = BTreeMap::new();
        for p in &self.parents {
            *categories.entry(p.metadata.category).or_insert(0) += 1;
            *difficulties.entry(p.metadata.difficulty).or_insert(0) += 1;
        }
        let total_size: usize = self.chunks.iter().map(|c| c.chunk_size).sum();
        let avg_chunk_size = if self.chunks.is_empty() { 0.0 } else { total_size as f64 / self.chunks.len() as f64 };
        CorpusStatistics {
            total_documents: self.parents.len(),
            total_chunks: self.chunks.len(),
            categories,
            difficulties,
            avg_chunk_size,
        }
    }

    /// Writes one JSON record per parent to `output_path`.
    pub fn export_metadata(&self, output_path: &Path) -> anyhow::Result<()> {
        let records: Vec<MetadataRecord<'_>> = self
            .parents
            .iter()
            .map(|p| MetadataRecord {
                source: &p.metadata.source,
                dish_name: &p.metadata.dish_name,
                category: p.metadata.category,
                difficulty: p.metadata.difficulty,
                content_length: p.content.chars().count(),
            })
            .collect();
        std::fs::write(output_path, serde_json::to_string_pretty(&records)?)?;
        tracing::info!(path = %output_path.display(), documents = records.len(), "exported metadata");
        Ok(())
    }
}
