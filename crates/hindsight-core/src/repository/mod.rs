//! Repository trait definitions (ports) for the trajectory store.
//!
//! Only the trait contract is defined here; implementations live in
//! hindsight-infra.

pub mod trajectory;

pub use trajectory::TrajectoryRepository;
