//! cookrag-vector
//!
//! Dense retrieval over chunk embeddings. [`FlatVectorIndex`] answers queries
//! in memory; [`LanceVectorStore`] persists chunks and their vectors to a
//! LanceDB table so a restart can skip re-embedding the corpus.

pub mod flat;
pub mod lance;
pub mod schema;

pub use flat::FlatVectorIndex;
pub use lance::LanceVectorStore;
