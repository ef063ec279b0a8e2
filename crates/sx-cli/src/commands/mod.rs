//! CLI command implementations.

pub mod pools;
pub mod provision;
pub mod status;
