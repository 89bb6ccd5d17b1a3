//! Operator preferences: types, resolution, and persistence.

pub mod fingerprint;
pub mod store;
pub mod types;

pub use store::*;
pub use types::*;
