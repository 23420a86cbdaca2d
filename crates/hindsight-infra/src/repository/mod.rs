//! Persistence adapters for the trajectory store.

pub mod file;

pub use file::FileTrajectoryRepository;
