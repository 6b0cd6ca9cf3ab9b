use thiserror::Error;

use crate::store::StoreState;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate parent {parent_id}: already held by '{existing}', refusing '{incoming}'")]
    DuplicateParent {
        parent_id: String,
        existing: String,
        incoming: String,
    },

    #[error("Unknown parent: {0}")]
    UnknownParent(String),

    #[error("Unsupported {kind} label: {label}")]
    UnsupportedLabel { kind: &'static str, label: String },

    #[error("Unknown metadata field: {0}")]
    UnknownField(String),

    #[error("Corpus is empty: {0}")]
    EmptyCorpus(&'static str),

    #[error("Cannot {operation} while the store is {state}")]
    InvalidState {
        operation: &'static str,
        state: StoreState,
    },

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
