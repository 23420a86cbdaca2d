//! The trajectory store: persistence, indexing and curation state.

mod state;
pub mod trajectory_store;

pub use trajectory_store::TrajectoryStore;
