use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use cookrag_core::types::{ChildChunk, ParentDocument};
use cookrag_core::{DocumentStore, Result};

#[derive(Debug, Clone)]
pub struct ParentHit {
    pub parent: Arc<ParentDocument>,
    /// Distinct child chunks in the input that belong to this parent.
    pub votes: usize,
}

/// Groups ranked children by parent. Parents with more matching children
/// come first; equal counts keep the order of each parent's first child.
/// Children whose parent is not in `store` are logged and skipped.
pub fn resolve_parents_with_votes<'a, I>(store: &DocumentStore, children: I) -> Result<Vec<ParentHit>>
where
    I: IntoIterator<Item = &'a ChildChunk>,
{
    store.require_ingested()?;
    let mut hits: Vec<ParentHit> = Vec::new();
    let mut slots: HashMap<&'a str, usize> = HashMap::new();
    let mut seen: HashSet<&'a str> = HashSet::new();

    for child in children {
        if !seen.insert(child.chunk_id.as_str()) { continue; }
        if let Some(&slot) = slots.get(child.parent_id.as_str()) {
            hits[slot].votes += 1;
            continue;
        }
        match store.get_parent(&child.parent_id) {
            Ok(parent) => {
                slots.insert(child.parent_id.as_str(), hits.len());
                hits.push(ParentHit { parent, votes: 1 });
            }
            Err(_) => warn!(chunk_id = %child.chunk_id, parent_id = %child.parent_id, "skipping chunk with unknown parent"),
        }
    }

    hits.sort_by(|a, b| b.votes.cmp(&a.votes));
    info!(children = seen.len(), parents = hits.len(), "resolved parent documents");
    Ok(hits)
}

pub fn resolve_parents<'a, I>(store: &DocumentStore, children: I) -> Result<Vec<Arc<ParentDocument>>>
where
    I: IntoIterator<Item = &'a ChildChunk>,
{
    Ok(resolve_parents_with_votes(store, children)?.into_iter().map(|h| h.parent).collect())
}
