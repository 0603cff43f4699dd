//! Shared primitives: frame ranges, cancellation, and the error taxonomy.

pub mod core;
pub mod error;
