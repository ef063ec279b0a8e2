//! Failure reporting.
//!
//! Reports are best-effort: [`report_best_effort`] never fails, it logs a
//! warning when the reporter cannot deliver and lets the original error
//! continue to the caller unchanged.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Structured error telemetry for one failed invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Reporting service.
    pub service_name: String,
    /// Short error kind (`RemoteCreateError`, `LookupNotFound`, ...).
    pub error_name: String,
    /// Tenant project, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    /// Where the failure happened (operation, step, invocation id).
    #[serde(default)]
    pub process_info: Value,
    /// Invocation arguments.
    #[serde(default)]
    pub input_data: Value,
    /// Error detail.
    #[serde(default)]
    pub error_data: Value,
    /// Rendered error source chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stack: Option<String>,
}

/// Renders an error and its sources as `outer: inner: root`.
#[must_use]
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// Sink for failure reports.
#[async_trait]
pub trait FailureReporter: Send + Sync {
    /// Delivers a report.
    async fn report(&self, report: &FailureReport) -> Result<()>;
}

/// Delivers `report`, logging instead of failing if delivery fails.
pub async fn report_best_effort(reporter: &dyn FailureReporter, report: &FailureReport) {
    if let Err(e) = reporter.report(report).await {
        tracing::warn!(
            error = %e,
            error_name = %report.error_name,
            project_id = ?report.project_id,
            "failure report not delivered"
        );
    }
}

/// Reporter POSTing JSON reports to an error notificator endpoint.
#[derive(Debug, Clone)]
pub struct HttpFailureReporter {
    client: reqwest::Client,
    url: String,
}

impl HttpFailureReporter {
    /// Creates a reporter for `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty or the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::InvalidInput(
                "error notificator URL cannot be empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl FailureReporter for HttpFailureReporter {
    async fn report(&self, report: &FailureReport) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(report)
            .send()
            .await
            .map_err(|e| Error::Reporter(format!("error notificator request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Reporter(format!(
                "error notificator returned {status}"
            )))
        }
    }
}

/// Reporter that only logs; used when no notificator endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFailureReporter;

#[async_trait]
impl FailureReporter for LogFailureReporter {
    async fn report(&self, report: &FailureReport) -> Result<()> {
        tracing::error!(
            service_name = %report.service_name,
            error_name = %report.error_name,
            project_id = ?report.project_id,
            error_data = %report.error_data,
            "provisioning failure"
        );
        Ok(())
    }
}

/// In-memory reporter for testing.
#[derive(Debug, Default)]
pub struct InMemoryFailureReporter {
    reports: RwLock<Vec<FailureReport>>,
    failing: RwLock<bool>,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Reporter("reporter lock poisoned".into())
}

impl InMemoryFailureReporter {
    /// Creates an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every delivery fail (the report is still recorded).
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn set_failing(&self, failing: bool) -> Result<()> {
        *self.failing.write().map_err(poison_err)? = failing;
        Ok(())
    }

    /// Reports received so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn reports(&self) -> Result<Vec<FailureReport>> {
        Ok(self.reports.read().map_err(poison_err)?.clone())
    }
}

#[async_trait]
impl FailureReporter for InMemoryFailureReporter {
    async fn report(&self, report: &FailureReport) -> Result<()> {
        self.reports
            .write()
            .map_err(poison_err)?
            .push(report.clone());
        if *self.failing.read().map_err(poison_err)? {
            return Err(Error::Reporter("injected reporter failure".into()));
        }
        Ok(())
    }
}
