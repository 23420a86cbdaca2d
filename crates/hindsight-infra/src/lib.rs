//! Infrastructure layer for Hindsight.
//!
//! Contains implementations of the ports defined in `hindsight-core`:
//! file-backed trajectory persistence, the local filesystem adapter,
//! SHA-256 content hashing, embedders, and the TOML config loader.

pub mod config;
pub mod crypto;
pub mod filesystem;
pub mod repository;
pub mod store;
pub mod vector;
