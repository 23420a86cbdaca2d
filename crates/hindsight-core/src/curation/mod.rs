//! Curation: supersession on insert and utility-based eviction.

pub mod manager;
pub mod supersession;

pub use manager::CurationManager;
