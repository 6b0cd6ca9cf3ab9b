use std::sync::Arc;

use crate::types::{ChunkRef, ParentDocument, Route, Section};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for query"))
    }
}

/// Keyword (term-frequency) ranking over child chunks.
pub trait TextIndexer: Send + Sync {
    fn index(&self, chunks: &[ChunkRef]) -> anyhow::Result<()>;
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<ChunkRef>>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Nearest-neighbour ranking over chunk embeddings.
pub trait VectorIndexer: Send + Sync {
    fn index(&self, chunks: &[ChunkRef], embeddings: &[Vec<f32>]) -> anyhow::Result<()>;
    fn search_vec(&self, query_vec: &[f32], k: usize) -> anyhow::Result<Vec<ChunkRef>>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Structural splitter: parent text to ordered `(header_path, text)` sections.
pub trait Splitter: Send + Sync {
    fn split(&self, text: &str) -> Vec<Section>;
}

pub trait QueryRouter: Send + Sync {
    fn classify_route(&self, query: &str) -> anyhow::Result<Route>;
}

pub trait QueryRewriter: Send + Sync {
    fn rewrite(&self, query: &str) -> anyhow::Result<String>;
}

/// Lazily produced answer text.
pub type FragmentStream = Box<dyn Iterator<Item = anyhow::Result<String>> + Send>;

pub trait Generator: Send + Sync {
    fn generate(&self, route: Route, query: &str, context: &[Arc<ParentDocument>]) -> anyhow::Result<String>;

    fn generate_stream(&self, route: Route, query: &str, context: &[Arc<ParentDocument>]) -> anyhow::Result<FragmentStream> {
        let text = self.generate(route, query, context)?;
        Ok(Box::new(std::iter::once(Ok(text))))
    }
}
