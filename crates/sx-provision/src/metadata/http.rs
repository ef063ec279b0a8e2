//! HTTP tenant directory backed by the API gateway.
//!
//! `POST {gateway}/api/v1/data-provider-for-cloud-service/get-project-info`
//! with body `{"project_id": n}`. A 404 means the project is unknown.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use sx_core::ProjectId;

use super::{TenantDirectory, TenantMetadata};
use crate::error::{Error, Result};

const PROJECT_INFO_PATH: &str = "/api/v1/data-provider-for-cloud-service/get-project-info";

#[derive(Debug, Serialize)]
struct ProjectInfoRequest {
    project_id: ProjectId,
}

/// Tenant directory calling the API gateway.
pub struct HttpTenantDirectory {
    client: reqwest::Client,
    endpoint: String,
    authorization: Option<String>,
}

impl std::fmt::Debug for HttpTenantDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTenantDirectory")
            .field("endpoint", &self.endpoint)
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl HttpTenantDirectory {
    /// Creates a directory for the gateway at `gateway_host`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty or the HTTP client cannot be built.
    pub fn new(
        gateway_host: &str,
        authorization: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let host = gateway_host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(Error::InvalidInput(
                "API gateway host cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{host}{PROJECT_INFO_PATH}"),
            authorization,
        })
    }

    /// Full lookup URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TenantDirectory for HttpTenantDirectory {
    async fn get_project_info(&self, project_id: ProjectId) -> Result<Option<TenantMetadata>> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&ProjectInfoRequest { project_id });
        if let Some(authorization) = &self.authorization {
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Metadata(format!("project info request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(%project_id, "project not found in tenant registry");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(Error::Metadata(format!(
                "project info lookup returned {status}: {}",
                body.trim()
            )));
        }

        let tenant = response
            .json::<TenantMetadata>()
            .await
            .map_err(|e| Error::Metadata(format!("invalid project info payload: {e}")))?;
        Ok(Some(tenant))
    }
}
