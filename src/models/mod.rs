//! Core data models for research papers and search operations.

mod paper;
mod search;

pub use paper::{Paper, PaperBuilder};
pub use search::{SearchQuery, SearchResult};
