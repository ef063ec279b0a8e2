//! Provisioner configuration.
//!
//! Read from `SX_*` environment variables by [`Config::from_env`]. Values are
//! trimmed and empty values count as unset.

use std::sync::Arc;
use std::time::Duration;

use sx_core::{LogFormat, ObjectStoreBackend};

use crate::error::{Error, Result};
use crate::metadata::http::HttpTenantDirectory;
use crate::orchestrator::DEFAULT_SERVICE_NAME;
use crate::reporter::{FailureReporter, HttpFailureReporter, LogFailureReporter};
use crate::store::object::ObjectStateStore;

/// Default timeout for metadata and reporter HTTP calls.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Provisioner configuration.
#[derive(Clone)]
pub struct Config {
    /// `service_name` on failure reports.
    pub service_name: String,
    /// Base URL of the tenant metadata gateway.
    pub api_gateway_host: Option<String>,
    /// Authorization header value sent to the gateway.
    pub api_gateway_authorization: Option<String>,
    /// Failure reporter endpoint; reports are only logged when unset.
    pub error_notificator_url: Option<String>,
    /// Object-store URL for checkpoints; required to open the state store.
    pub state_bucket: Option<String>,
    /// JSON file listing resource pools.
    pub resource_pools_file: Option<String>,
    /// Serialize invocations for the same project in-process.
    pub serialize_per_project: bool,
    /// Log output format.
    pub log_format: LogFormat,
    /// Timeout for metadata and reporter HTTP calls.
    pub http_timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("service_name", &self.service_name)
            .field("api_gateway_host", &self.api_gateway_host)
            .field(
                "api_gateway_authorization",
                &self.api_gateway_authorization.as_ref().map(|_| "[REDACTED]"),
            )
            .field("error_notificator_url", &self.error_notificator_url)
            .field("state_bucket", &self.state_bucket)
            .field("resource_pools_file", &self.resource_pools_file)
            .field("serialize_per_project", &self.serialize_per_project)
            .field("log_format", &self.log_format)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            api_gateway_host: None,
            api_gateway_authorization: None,
            error_notificator_url: None,
            state_bucket: None,
            resource_pools_file: None,
            serialize_per_project: true,
            log_format: LogFormat::default(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env { lookup };
        let mut config = Self::default();

        if let Some(name) = env.string("SX_SERVICE_NAME") {
            config.service_name = name;
        }
        config.api_gateway_host = env.string("SX_API_GATEWAY_HOST");
        config.api_gateway_authorization = env.string("SX_API_GATEWAY_AUTHORIZATION");
        config.error_notificator_url = env.string("SX_ERROR_NOTIFICATOR_URL");
        config.state_bucket = env.string("SX_STATE_BUCKET");
        config.resource_pools_file = env.string("SX_RESOURCE_POOLS_FILE");
        if let Some(serialize) = env.bool("SX_SERIALIZE_PER_PROJECT")? {
            config.serialize_per_project = serialize;
        }
        if let Some(format) = env.string("SX_LOG_FORMAT") {
            config.log_format = format
                .parse()
                .map_err(|e| Error::InvalidInput(format!("SX_LOG_FORMAT: {e}")))?;
        }
        if let Some(secs) = env.u64("SX_HTTP_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(Error::InvalidInput(
                    "SX_HTTP_TIMEOUT_SECS must be greater than zero".to_string(),
                ));
            }
            config.http_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Checkpoint store over [`Config::state_bucket`].
    ///
    /// # Errors
    ///
    /// Returns an error if `SX_STATE_BUCKET` is unset or its URL is not
    /// supported.
    pub fn state_store(&self) -> Result<ObjectStateStore> {
        let bucket = self.state_bucket.as_deref().ok_or_else(|| {
            Error::InvalidInput("SX_STATE_BUCKET is required".to_string())
        })?;
        let backend = ObjectStoreBackend::from_url(bucket)?;
        Ok(ObjectStateStore::new(Arc::new(backend)))
    }

    /// Tenant directory calling the configured gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if `SX_API_GATEWAY_HOST` is unset.
    pub fn tenant_directory(&self) -> Result<HttpTenantDirectory> {
        let host = self.api_gateway_host.as_deref().ok_or_else(|| {
            Error::InvalidInput("SX_API_GATEWAY_HOST is required".to_string())
        })?;
        HttpTenantDirectory::new(
            host,
            self.api_gateway_authorization.clone(),
            self.http_timeout,
        )
    }

    /// Failure reporter for the configured notificator, or a log-only reporter.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn failure_reporter(&self) -> Result<Arc<dyn FailureReporter>> {
        match &self.error_notificator_url {
            Some(url) => Ok(Arc::new(HttpFailureReporter::new(
                url.clone(),
                self.http_timeout,
            )?)),
            None => Ok(Arc::new(LogFailureReporter)),
        }
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn u64(&self, name: &str) -> Result<Option<u64>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u64>()
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
    }

    fn bool(&self, name: &str) -> Result<Option<bool>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        parse_bool(name, &v).map(Some)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.service_name, "sx-provisioner");
        assert!(config.state_bucket.is_none());
        assert!(config.serialize_per_project);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert!(config.error_notificator_url.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("SX_SERVICE_NAME", " provisioner-eu "),
            ("SX_API_GATEWAY_HOST", "https://gw.example.com"),
            ("SX_SERIALIZE_PER_PROJECT", "no"),
            ("SX_LOG_FORMAT", "json"),
            ("SX_HTTP_TIMEOUT_SECS", "5"),
            ("SX_ERROR_NOTIFICATOR_URL", ""),
        ])
        .unwrap();
        assert_eq!(config.service_name, "provisioner-eu");
        assert_eq!(config.api_gateway_host.as_deref(), Some("https://gw.example.com"));
        assert!(!config.serialize_per_project);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert!(config.error_notificator_url.is_none());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("SX_SERIALIZE_PER_PROJECT", "maybe")]).is_err());
        assert!(config(&[("SX_HTTP_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config(&[("SX_HTTP_TIMEOUT_SECS", "0")]).is_err());
        assert!(config(&[("SX_LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn parse_bool_values() {
        assert!(parse_bool("TEST", "TRUE").unwrap());
        assert!(parse_bool("TEST", "1").unwrap());
        assert!(!parse_bool("TEST", "n").unwrap());
        assert!(parse_bool("TEST", "").is_err());
    }

    #[test]
    fn debug_redacts_authorization() {
        let config = config(&[("SX_API_GATEWAY_AUTHORIZATION", "secret-code")]).unwrap();
        let rendered = format!("{config:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("secret-code"));
    }

    #[test]
    fn builds_collaborators() {
        let config = config(&[("SX_STATE_BUCKET", "memory://")]).unwrap();
        assert!(config.state_store().is_ok());
        assert!(config.failure_reporter().is_ok());
        assert!(config.tenant_directory().is_err());
    }

    #[test]
    fn state_store_requires_bucket() {
        let err = config(&[]).unwrap().state_store().unwrap_err();
        assert!(err.to_string().contains("SX_STATE_BUCKET"));
    }
}
