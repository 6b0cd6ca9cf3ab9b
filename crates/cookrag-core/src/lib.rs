//! cookrag-core
//!
//! Domain types, configuration, markdown ingestion and the in-memory document
//! store shared by the retrieval crates.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod splitter;
pub mod store;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use store::{DocumentStore, StoreState};
