//! cookrag-text
//!
//! Tantivy-backed BM25 keyword retrieval over child chunks. Text is analysed
//! by [`analyzer::terms_analyzer`] so Chinese recipes rank on character
//! unigrams and bigrams.

pub mod analyzer;
pub mod tantivy_utils;
pub mod index;

pub use analyzer::{terms, terms_analyzer};
pub use index::TantivyChunkIndex;
