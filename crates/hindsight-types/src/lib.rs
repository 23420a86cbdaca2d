//! Shared domain types for Hindsight.
//!
//! This crate contains the core domain types of the trajectory experience
//! store: Trajectory, Step, CodeArtifact, DeferredValidation,
//! CurationMetadata, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod artifact;
pub mod config;
pub mod curation;
pub mod error;
pub mod index;
pub mod store;
pub mod trajectory;
