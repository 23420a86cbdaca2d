//! Infrastructure ports used by the store's services.

pub mod fs;
pub mod hash;
