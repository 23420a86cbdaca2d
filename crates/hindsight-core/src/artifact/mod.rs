//! Code artifacts: extraction from actions and deferred persistence checks.

pub mod extract;
pub mod lines;
pub mod validate;

pub use extract::ArtifactExtractor;
pub use validate::{PersistenceValidator, ValidationContext};
