//! # sx-core
//!
//! Core primitives shared by the sx provisioning crates.
//!
//! This crate provides the foundational types used across all components:
//!
//! - **Identifiers**: Strongly-typed IDs for tenant projects, resource pools
//!   and provisioning invocations
//! - **Storage**: Object storage abstraction used for durable checkpoints
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging initialisation and span helpers
//!
//! ## Example
//!
//! ```rust
//! use sx_core::prelude::*;
//!
//! let project = ProjectId::new(42).unwrap();
//! let pool = ResourcePoolId::new("eu-pool").unwrap();
//! assert_eq!(project.get(), 42);
//! assert_eq!(pool.as_str(), "eu-pool");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod observability;
pub mod storage;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{InvocationId, ProjectId, ResourcePoolId};
    pub use crate::storage::{
        MemoryBackend, ObjectStoreBackend, StorageBackend, WritePrecondition,
        WriteResult,
    };
}

pub use error::{Error, Result};
pub use id::{InvocationId, ProjectId, ResourcePoolId};
pub use observability::{LogFormat, init_logging, provisioning_span};
pub use storage::{
    MemoryBackend, ObjectStoreBackend, StorageBackend, WritePrecondition, WriteResult,
};
