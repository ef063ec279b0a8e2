//! Strongly-typed identifiers.
//!
//! - [`ProjectId`]: the tenant project being provisioned (positive integer)
//! - [`ResourcePoolId`]: opaque id of the environment resources land in
//! - [`InvocationId`]: ULID stamped on each provisioning invocation for log correlation
//!
//! # Example
//!
//! ```rust
//! use sx_core::id::{ProjectId, ResourcePoolId};
//!
//! let project: ProjectId = "42".parse().unwrap();
//! assert_eq!(project.to_string(), "42");
//!
//! assert!(ResourcePoolId::new("").is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{Error, Result};

/// Identifier of a tenant project.
///
/// Always strictly positive. Used verbatim when deriving remote resource
/// names, so two runs for the same project produce identical names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct ProjectId(u64);

impl ProjectId {
    /// Creates a project ID.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is zero.
    pub fn new(id: u64) -> Result<Self> {
        if id == 0 {
            return Err(Error::InvalidId {
                message: "project ID must be a positive integer".to_string(),
            });
        }
        Ok(Self(id))
    }

    /// Returns the raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for ProjectId {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ProjectId> for u64 {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim().parse::<u64>().map_err(|e| Error::InvalidId {
            message: format!("invalid project ID '{s}': {e}"),
        })?;
        Self::new(raw)
    }
}

/// Identifier of a resource pool.
///
/// Opaque to this system, but must be non-empty, at most 128 characters,
/// and free of whitespace and path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourcePoolId(String);

impl ResourcePoolId {
    /// Creates a resource pool ID after validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID is empty, too long, or contains
    /// whitespace or `/`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::InvalidId {
                message: "resource pool ID cannot be empty".to_string(),
            });
        }

        if id.len() > 128 {
            return Err(Error::InvalidId {
                message: format!("resource pool ID '{id}' is too long (maximum 128 characters)"),
            });
        }

        if id.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(Error::InvalidId {
                message: format!(
                    "resource pool ID '{id}' contains whitespace or path separators"
                ),
            });
        }

        Ok(())
    }
}

impl TryFrom<String> for ResourcePoolId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ResourcePoolId> for String {
    fn from(id: ResourcePoolId) -> Self {
        id.0
    }
}

impl FromStr for ResourcePoolId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for ResourcePoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ResourcePoolId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of one provisioning invocation.
///
/// Not persisted in the checkpoint; it only ties together the log lines
/// and failure report of a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(Ulid);

impl InvocationId {
    /// Generates a new unique invocation ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_id_rejects_zero() {
        assert!(ProjectId::new(0).is_err());
        assert!(ProjectId::new(1).is_ok());
    }

    #[test]
    fn project_id_parses_from_str() {
        let id: ProjectId = " 42 ".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert!("-3".parse::<ProjectId>().is_err());
        assert!("abc".parse::<ProjectId>().is_err());
        assert!("0".parse::<ProjectId>().is_err());
    }

    #[test]
    fn project_id_serde_rejects_zero() {
        assert!(serde_json::from_str::<ProjectId>("0").is_err());
        let id: ProjectId = serde_json::from_str("7").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
    }

    #[test]
    fn resource_pool_ids() {
        assert!(ResourcePoolId::new("eu-pool").is_ok());
        assert!(ResourcePoolId::new("64f1c0a9e4b0").is_ok());
        assert!(ResourcePoolId::new("").is_err());
        assert!(ResourcePoolId::new("has space").is_err());
        assert!(ResourcePoolId::new("a/b").is_err());
        assert!(ResourcePoolId::new("x".repeat(129)).is_err());
    }

    #[test]
    fn invocation_ids_are_unique() {
        assert_ne!(InvocationId::generate(), InvocationId::generate());
    }
}
