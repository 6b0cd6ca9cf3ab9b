//! Reciprocal rank fusion of a dense and a sparse ranking.
//!
//! Each list contributes `1 / (smoothing_k + rank + 1)` for every item at
//! zero-based `rank`; an item's fused score is the sum over both lists.
//! Items are identified by their text, so two chunks with the same content
//! collapse into one result no matter which path retrieved them.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use cookrag_core::types::ChunkRef;

/// Which rankings a fused result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Dense,
    Sparse,
    Both,
}

impl SourceKind {
    fn merge(self, other: SourceKind) -> SourceKind {
        if self == other { self } else { SourceKind::Both }
    }
}

#[derive(Debug, Clone)]
pub struct RankedResult {
    pub chunk: ChunkRef,
    pub score: f64,
    pub source: SourceKind,
}

pub fn rrf_contribution(smoothing_k: usize, rank: usize) -> f64 {
    1.0 / (smoothing_k + rank + 1) as f64
}

/// Scores that agree to 12 decimal places compare equal. Sums of
/// reciprocals can land an ulp away from a single-list score of the same value.
const SCORE_GRID: f64 = 1e12;

fn score_key(score: f64) -> i64 {
    (score * SCORE_GRID).round() as i64
}

/// Merges two rankings into one, best first.
///
/// Equal scores prefer results found by both lists, then the order in which
/// results were first seen scanning `dense` before `sparse`. The first chunk
/// seen with a given text represents it in the output.
///
/// `smoothing_k` is expected to be positive. A value of 0 is still accepted
/// and gives the top rank of each list a contribution of 1.
pub fn fuse(dense: &[ChunkRef], sparse: &[ChunkRef], smoothing_k: usize) -> Vec<RankedResult> {
    let mut fused: Vec<RankedResult> = Vec::with_capacity(dense.len() + sparse.len());
    let mut by_content: HashMap<&str, usize> = HashMap::with_capacity(dense.len() + sparse.len());

    for (list, kind) in [(dense, SourceKind::Dense), (sparse, SourceKind::Sparse)] {
        for (rank, chunk) in list.iter().enumerate() {
            let contribution = rrf_contribution(smoothing_k, rank);
            debug!(source = ?kind, rank = rank + 1, contribution, chunk_id = %chunk.chunk_id, "rrf contribution");
            match by_content.get(chunk.content.as_str()) {
                Some(&slot) => {
                    let entry = &mut fused[slot];
                    entry.score += contribution;
                    entry.source = entry.source.merge(kind);
                }
                None => {
                    by_content.insert(chunk.content.as_str(), fused.len());
                    fused.push(RankedResult { chunk: chunk.clone(), score: contribution, source: kind });
                }
            }
        }
    }

    // stable sort: remaining ties keep first-seen order
    fused.sort_by(|a, b| {
        score_key(b.score)
            .cmp(&score_key(a.score))
            .then_with(|| (b.source == SourceKind::Both).cmp(&(a.source == SourceKind::Both)))
    });
    info!(dense = dense.len(), sparse = sparse.len(), fused = fused.len(), "rrf fusion complete");
    fused
}
