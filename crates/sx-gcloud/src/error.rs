//! Error types for remote resource clients.

/// The result type used throughout sx-gcloud.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the warehouse and messaging clients.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The provider rejected a create call (naming conflict, quota, permissions).
    #[error("failed to create {resource}: {message}")]
    RemoteCreate {
        /// Fully qualified name of the resource being created.
        resource: String,
        /// Provider or transport error detail.
        message: String,
    },

    /// A read-only call (existence check) failed for a reason other than "not found".
    #[error("failed to query {resource}: {message}")]
    RemoteQuery {
        /// Fully qualified name of the resource being queried.
        resource: String,
        /// Provider or transport error detail.
        message: String,
    },

    /// Client configuration is invalid or credentials are unavailable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A request or response body could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a remote-create error.
    #[must_use]
    pub fn remote_create(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteCreate {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Creates a remote-query error.
    #[must_use]
    pub fn remote_query(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteQuery {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns the short, stable name of the error kind.
    ///
    /// Used as `error_name` in failure reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RemoteCreate { .. } => "RemoteCreateError",
            Self::RemoteQuery { .. } => "RemoteQueryError",
            Self::Configuration(_) => "ConfigurationError",
            Self::Serialization(_) => "SerializationError",
            Self::Internal { .. } => "InternalError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_create_display_names_resource() {
        let err = Error::remote_create("dataset acme-eu:sx_42", "Already Exists");
        assert_eq!(
            err.to_string(),
            "failed to create dataset acme-eu:sx_42: Already Exists"
        );
        assert_eq!(err.kind(), "RemoteCreateError");
    }

    #[test]
    fn remote_query_kind() {
        let err = Error::remote_query("topic collector_42", "403 Forbidden");
        assert_eq!(err.kind(), "RemoteQueryError");
    }
}
