//! Metadata post-filtering of fused results.

use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

use cookrag_core::types::{Category, ChildChunk, Difficulty, MetadataField};
use cookrag_core::Result;

use crate::fusion::RankedResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateValue {
    Exact(String),
    OneOf(Vec<String>),
}

impl PredicateValue {
    fn accepts(&self, value: &str) -> bool {
        match self {
            PredicateValue::Exact(v) => v == value,
            PredicateValue::OneOf(vs) => vs.iter().any(|v| v == value),
        }
    }
}

impl fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateValue::Exact(v) => f.write_str(v),
            PredicateValue::OneOf(vs) => write!(f, "[{}]", vs.join(", ")),
        }
    }
}

/// Field to required value (or value set). Every field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPredicates { fields: BTreeMap<MetadataField, PredicateValue> }

/// Category and difficulty values are stored as their labels so either the
/// key or the label may be given.
fn normalize(field: MetadataField, value: &str) -> Result<String> {
    Ok(match field {
        MetadataField::Category => value.parse::<Category>()?.label().to_string(),
        MetadataField::Difficulty => value.parse::<Difficulty>()?.label().to_string(),
        _ => value.to_string(),
    })
}

impl FilterPredicates {
    pub fn new() -> Self { Self::default() }

    pub fn require(mut self, field: MetadataField, value: &str) -> Result<Self> {
        self.insert(field, PredicateValue::Exact(value.to_string()))?;
        Ok(self)
    }

    pub fn require_any<I, S>(mut self, field: MetadataField, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values = values.into_iter().map(|v| v.as_ref().to_string()).collect();
        self.insert(field, PredicateValue::OneOf(values))?;
        Ok(self)
    }

    pub fn insert(&mut self, field: MetadataField, value: PredicateValue) -> Result<()> {
        let value = match value {
            PredicateValue::Exact(v) => PredicateValue::Exact(normalize(field, &v)?),
            PredicateValue::OneOf(vs) => PredicateValue::OneOf(vs.iter().map(|v| normalize(field, v)).collect::<Result<_>>()?),
        };
        self.fields.insert(field, value);
        Ok(())
    }

    /// Like [`insert`](Self::insert) with the field given by name; unknown names fail.
    pub fn insert_named(&mut self, name: &str, value: PredicateValue) -> Result<()> {
        self.insert(name.parse()?, value)
    }

    pub fn get(&self, field: MetadataField) -> Option<&PredicateValue> { self.fields.get(&field) }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    pub fn len(&self) -> usize { self.fields.len() }

    /// A chunk lacking any constrained field never matches.
    pub fn matches(&self, chunk: &ChildChunk) -> bool {
        self.fields.iter().all(|(field, value)| chunk.field(*field).is_some_and(|v| value.accepts(v)))
    }
}

impl fmt::Display for FilterPredicates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, value)) in self.fields.iter().enumerate() {
            if i > 0 { f.write_str(", ")?; }
            write!(f, "{field}={value}")?;
        }
        Ok(())
    }
}

/// Number of fused results to draw before filtering down to `desired`.
pub fn candidate_budget(desired: usize, over_fetch_factor: usize) -> usize {
    desired.saturating_mul(over_fetch_factor.max(1))
}

/// Keeps matching results in fused order, looking at no more than
/// `desired * over_fetch_factor` candidates. Best effort: a short result is
/// returned as is.
pub fn filter_ranked(fused: &[RankedResult], predicates: &FilterPredicates, desired: usize, over_fetch_factor: usize) -> Vec<RankedResult> {
    let budget = candidate_budget(desired, over_fetch_factor);
    let kept: Vec<RankedResult> = fused
        .iter()
        .take(budget)
        .filter(|r| predicates.matches(&r.chunk))
        .take(desired)
        .cloned()
        .collect();
    info!(candidates = fused.len().min(budget), kept = kept.len(), desired, filters = %predicates, "metadata filter applied");
    kept
}

/// Predicates implied by the wording of a query: the first category label it
/// mentions and the longest difficulty label it mentions.
pub fn extract_filters(query: &str) -> FilterPredicates {
    let mut fields = BTreeMap::new();
    if let Some(category) = Category::supported().iter().find(|c| query.contains(c.label())) {
        fields.insert(MetadataField::Category, PredicateValue::Exact(category.label().to_string()));
    }
    let mut difficulties = Difficulty::supported().to_vec();
    difficulties.sort_by_key(|d| std::cmp::Reverse(d.label().chars().count()));
    if let Some(difficulty) = difficulties.iter().find(|d| query.contains(d.label())) {
        fields.insert(MetadataField::Difficulty, PredicateValue::Exact(difficulty.label().to_string()));
    }
    FilterPredicates { fields }
}
