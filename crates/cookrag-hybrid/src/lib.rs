//! cookrag-hybrid
//!
//! Hybrid retrieval over recipe chunks: reciprocal rank fusion of dense and
//! sparse rankings, metadata post-filtering, parent reconstruction and the
//! question-answering pipeline built on top of them.

pub mod filter;
pub mod fusion;
pub mod knowledge;
pub mod parents;
pub mod pipeline;
pub mod retrieval;

pub use filter::{extract_filters, filter_ranked, FilterPredicates, PredicateValue};
pub use fusion::{fuse, RankedResult, SourceKind};
pub use knowledge::{KnowledgeBase, KnowledgeHandle};
pub use parents::{resolve_parents, resolve_parents_with_votes, ParentHit};
pub use pipeline::{Answer, RecipeRag, Retrieval, NO_RESULTS_ANSWER};
pub use retrieval::HybridRetriever;
