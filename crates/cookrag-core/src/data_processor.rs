use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::splitter::MarkdownHeaderSplitter;
use crate::store::DocumentStore;
use crate::traits::Splitter;
use crate::types::{Category, ChildChunk, DocMetadata, Difficulty, HeaderPath, ParentDocument};

/// Stable parent identity: blake3 of the `/`-separated path relative to the corpus root.
pub fn parent_id_for(relative_path: &str) -> String {
    blake3::hash(relative_path.as_bytes()).to_hex().to_string()
}

/// Loads markdown recipes and splits them into child chunks.
pub struct DataProcessor {
    splitter: Box<dyn Splitter>,
}

impl Default for DataProcessor {
    fn default() -> Self { Self::new() }
}

impl DataProcessor {
    pub fn new() -> Self { Self { splitter: Box::new(MarkdownHeaderSplitter::default()) } }

    pub fn with_splitter(splitter: Box<dyn Splitter>) -> Self { Self { splitter } }

    /// Builds a parent from already-read markdown. No I/O.
    pub fn document_from_markdown(&self, relative_path: &str, source: &str, content: String) -> ParentDocument {
        let path = Path::new(relative_path);
        let dish_name = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let metadata = DocMetadata {
            source: source.to_string(),
            relative_path: relative_path.to_string(),
            category: Category::from_path(path),
            dish_name,
            difficulty: Difficulty::from_text(&content),
        };
        ParentDocument { parent_id: parent_id_for(relative_path), content, metadata }
    }

    pub fn load_documents(&self, data_dir: &Path) -> Result<Vec<ParentDocument>> {
        info!(dir = %data_dir.display(), "loading markdown documents");
        let files = self.list_md_files(data_dir);
        let mut documents = Vec::with_capacity(files.len());
        for file_path in &files {
            let content = match fs::read_to_string(file_path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %file_path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            let relative_path = relative_posix(file_path, data_dir);
            documents.push(self.document_from_markdown(&relative_path, &file_path.to_string_lossy(), content));
        }
        info!(count = documents.len(), dir = %data_dir.display(), "loaded documents");
        Ok(documents)
    }

    /// Splits every document; a document without structure becomes one
    /// pseudo-chunk whose id is the parent id.
    pub fn chunk_documents(&self, documents: &[ParentDocument]) -> crate::Result<Vec<ChildChunk>> {
        if documents.is_empty() {
            return Err(Error::EmptyCorpus("no documents loaded to chunk"));
        }
        let mut all_chunks = Vec::new();
        for doc in documents {
            let sections = self.splitter.split(&doc.content);
            debug!(dish = %doc.metadata.dish_name, sections = sections.len(), "split document");
            if sections.is_empty() {
                warn!(source = %doc.metadata.source, "no markdown structure detected, keeping document as a single chunk");
                all_chunks.push(ChildChunk {
                    chunk_id: doc.parent_id.clone(),
                    parent_id: doc.parent_id.clone(),
                    chunk_index: 0,
                    batch_index: all_chunks.len(),
                    chunk_size: doc.content.chars().count(),
                    content: doc.content.clone(),
                    headers: HeaderPath::default(),
                    metadata: doc.metadata.clone(),
                });
                continue;
            }
            for (chunk_index, section) in sections.into_iter().enumerate() {
                all_chunks.push(ChildChunk {
                    chunk_id: uuid::Uuid::new_v4().to_string(),
                    parent_id: doc.parent_id.clone(),
                    chunk_index,
                    batch_index: all_chunks.len(),
                    chunk_size: section.text.chars().count(),
                    content: section.text,
                    headers: section.headers,
                    metadata: doc.metadata.clone(),
                });
            }
        }
        info!(chunks = all_chunks.len(), documents = documents.len(), "chunking complete");
        Ok(all_chunks)
    }

    /// Loads, chunks and stores a whole corpus directory.
    pub fn ingest_directory(&self, data_dir: &Path) -> Result<DocumentStore> {
        let documents = self.load_documents(data_dir)?;
        self.ingest(documents)
    }

    /// Builds a fresh store. A path listed twice keeps its first position
    /// and its last text.
    pub fn ingest(&self, documents: Vec<ParentDocument>) -> Result<DocumentStore> {
        let documents = latest_per_path(documents);
        let chunks = self.chunk_documents(&documents)?;
        let mut store = DocumentStore::new();
        for doc in documents { store.put_parent(doc)?; }
        let mut grouped: Vec<(String, Vec<ChildChunk>)> = Vec::new();
        for chunk in chunks {
            match grouped.last_mut() {
                Some((pid, group)) if *pid == chunk.parent_id => group.push(chunk),
                _ => grouped.push((chunk.parent_id.clone(), vec![chunk])),
            }
        }
        for (parent_id, group) in grouped { store.put_chunks(&parent_id, group)?; }
        Ok(store)
    }

    fn list_md_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut md_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("md") { md_files.push(path.to_path_buf()); }
        }
        md_files.sort(); md_files
    }
}

fn latest_per_path(documents: Vec<ParentDocument>) -> Vec<ParentDocument> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(documents.len());
    let mut unique: Vec<ParentDocument> = Vec::with_capacity(documents.len());
    for doc in documents {
        match slots.get(&doc.metadata.relative_path) {
            Some(&slot) => {
                debug!(path = %doc.metadata.relative_path, "replacing earlier copy of document");
                unique[slot] = doc;
            }
            None => {
                slots.insert(doc.metadata.relative_path.clone(), unique.len());
                unique.push(doc);
            }
        }
    }
    unique
}

fn relative_posix(file_path: &Path, data_dir: &Path) -> String {
    let relative = match file_path.strip_prefix(data_dir) {
        Ok(rel) => rel,
        Err(_) => {
            warn!(path = %file_path.display(), "could not determine path relative to corpus root");
            file_path
        }
    };
    relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}
