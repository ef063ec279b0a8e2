//! Error types for provisioning.
//!
//! Two layers:
//! - [`Error`]: step-level failures with full detail, logged and forwarded to
//!   the failure reporter.
//! - [`ProvisionError`]: the caller-facing contract. Lookup misses surface as
//!   404s; every other failure collapses into one opaque 500.

use serde::{Deserialize, Serialize};
use sx_core::{ProjectId, ResourcePoolId};

/// The result type used throughout sx-provision.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while provisioning a project.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A warehouse or messaging call failed.
    #[error(transparent)]
    Remote(#[from] sx_gcloud::Error),

    /// Saving or loading the provisioning checkpoint failed.
    #[error("persistence error: {message}")]
    Persistence {
        /// Description of the persistence failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A metadata lookup failed for a reason other than "not found".
    #[error("metadata lookup failed: {0}")]
    Metadata(String),

    /// A step ran before the identifier it depends on was recorded.
    #[error("step {step} requires {requires} to be provisioned first")]
    DependencyMissing {
        /// Step that was attempted.
        step: &'static str,
        /// State field that is still unset.
        requires: &'static str,
    },

    /// Delivering a failure report failed.
    #[error("failure report not delivered: {0}")]
    Reporter(String),

    /// Invalid input or configuration.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An error from sx-core.
    #[error("core error: {0}")]
    Core(#[from] sx_core::Error),
}

impl Error {
    /// Creates a persistence error.
    #[must_use]
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a persistence error with a source cause.
    #[must_use]
    pub fn persistence_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Persistence {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Short, stable error name used in failure reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Remote(e) => e.kind(),
            Self::Persistence { .. } => "PersistenceError",
            Self::Metadata(_) => "MetadataError",
            Self::DependencyMissing { .. } => "DependencyMissingError",
            Self::Reporter(_) => "ReporterError",
            Self::InvalidInput(_) => "InvalidInputError",
            Self::Core(_) => "CoreError",
        }
    }
}

/// Caller-facing provisioning failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    /// The resource pool id did not resolve.
    #[error("resource group {resource_pool_id} not found")]
    ResourcePoolNotFound {
        /// The unresolved id.
        resource_pool_id: ResourcePoolId,
    },

    /// The tenant project is unknown to the metadata provider.
    #[error("project {project_id} not found")]
    TenantNotFound {
        /// The unresolved project.
        project_id: ProjectId,
    },

    /// Any other failure; detail is only available in logs and failure reports.
    #[error("internal server error")]
    ProvisioningFailed,
}

impl ProvisionError {
    /// HTTP-style status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::ResourcePoolNotFound { .. } | Self::TenantNotFound { .. } => 404,
            Self::ProvisioningFailed => 500,
        }
    }

    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ResourcePoolNotFound { .. } => "RESOURCE_GROUP_NOT_FOUND",
            Self::TenantNotFound { .. } => "PROJECT_NOT_FOUND",
            Self::ProvisioningFailed => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Human-readable message, safe to expose to callers.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::ResourcePoolNotFound { .. } => "Resource group not found".to_string(),
            Self::TenantNotFound { .. } => "Project not found".to_string(),
            Self::ProvisioningFailed => "Internal server error".to_string(),
        }
    }

    /// Serializable response body.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status: self.status(),
            code: self.code().to_string(),
            message: self.message(),
        }
    }
}

/// Wire form of a [`ProvisionError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP-style status code.
    pub status: u16,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}
