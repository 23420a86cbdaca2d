//! Business logic and port definitions for Hindsight.
//!
//! This crate defines the "ports" (embedder, repository, filesystem and
//! hasher traits) that the infrastructure layer implements, plus the
//! trajectory store, retriever and curation logic built on them. It depends
//! only on `hindsight-types` -- never on `hindsight-infra` or any I/O crate.

pub mod artifact;
pub mod curation;
pub mod embedder;
pub mod index;
pub mod repository;
pub mod retriever;
pub mod service;
pub mod store;

pub use retriever::Retriever;
pub use store::TrajectoryStore;
