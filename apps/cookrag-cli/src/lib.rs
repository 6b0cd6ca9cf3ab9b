//! cookrag-cli
//!
//! Wiring for the `cookrag` binary: the chat-completions client that routes,
//! rewrites and answers questions, and knowledge-base construction from a
//! recipe directory plus a saved vector index.

pub mod kb;
pub mod llm;

pub use kb::{build_knowledge, ingest_store, rebuild_vector_index};
pub use llm::ChatClient;
