//! Utility library for the pces-sweep project

pub mod other;
pub mod serde;
pub mod stats;
