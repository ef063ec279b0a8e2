//! Authenticated REST transport shared by the BigQuery and Pub/Sub clients.

use std::time::Duration;

use serde::Deserialize;

/// Google API error envelope.
#[cfg_attr(not(feature = "gcp"), allow(dead_code))]
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[cfg_attr(not(feature = "gcp"), allow(dead_code))]
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Renders a non-success response into a single-line error message.
#[cfg_attr(not(feature = "gcp"), allow(dead_code))]
pub(crate) fn describe_api_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) if !parsed.error.status.is_empty() => {
            format!("{} ({})", parsed.error.message, parsed.error.status)
        }
        Ok(parsed) => format!("HTTP {status}: {}", parsed.error.message),
        Err(_) => format!("HTTP {status}: {}", body.trim()),
    }
}

/// Formats a duration as a Google API duration string (`"600s"`, `"1.5s"`).
pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let nanos = duration.subsec_nanos();
    if nanos == 0 {
        return format!("{secs}s");
    }

    let mut fractional = format!("{nanos:09}");
    while fractional.ends_with('0') {
        fractional.pop();
    }

    format!("{secs}.{fractional}s")
}

#[cfg(feature = "gcp")]
pub(crate) mod http {
    use std::sync::Arc;
    use std::time::Duration;

    use gcp_auth::TokenProvider;
    use reqwest::{Method, StatusCode};
    use serde::Serialize;
    use serde::de::DeserializeOwned;

    use super::describe_api_error;
    use crate::error::{Error, Result};

    /// Bearer-authenticated JSON client for one OAuth scope.
    pub(crate) struct GcpTransport {
        token_provider: Arc<dyn TokenProvider>,
        client: reqwest::Client,
        scope: &'static str,
    }

    // TokenProvider doesn't implement Debug
    impl std::fmt::Debug for GcpTransport {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("GcpTransport")
                .field("token_provider", &"<TokenProvider>")
                .field("client", &self.client)
                .field("scope", &self.scope)
                .finish()
        }
    }

    impl GcpTransport {
        /// Discovers credentials from the environment and builds the HTTP client.
        pub(crate) async fn new(scope: &'static str, timeout: Duration) -> Result<Self> {
            let token_provider = gcp_auth::provider()
                .await
                .map_err(|e| Error::configuration(format!("failed to initialize GCP auth: {e}")))?;

            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| Error::configuration(format!("failed to create HTTP client: {e}")))?;

            Ok(Self {
                token_provider,
                client,
                scope,
            })
        }

        async fn access_token(&self) -> Result<String> {
            let token = self
                .token_provider
                .token(&[self.scope])
                .await
                .map_err(|e| Error::configuration(format!("failed to get GCP access token: {e}")))?;
            Ok(token.as_str().to_string())
        }

        /// `GET`s a resource: success means it exists, 404 means it does not.
        pub(crate) async fn exists(&self, resource: &str, url: &str) -> Result<bool> {
            let token = self.access_token().await?;
            let response = self
                .client
                .get(url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| Error::remote_query(resource, e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                return Ok(true);
            }
            if status == StatusCode::NOT_FOUND {
                return Ok(false);
            }

            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            Err(Error::remote_query(
                resource,
                describe_api_error(status.as_u16(), &body),
            ))
        }

        /// Sends a create request and decodes the created resource.
        pub(crate) async fn create<B, R>(
            &self,
            method: Method,
            resource: &str,
            url: &str,
            body: &B,
        ) -> Result<R>
        where
            B: Serialize + Sync,
            R: DeserializeOwned,
        {
            let token = self.access_token().await?;
            let response = self
                .client
                .request(method, url)
                .bearer_auth(&token)
                .json(body)
                .send()
                .await
                .map_err(|e| Error::remote_create(resource, e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                return response.json::<R>().await.map_err(|e| {
                    Error::Serialization(format!("failed to parse response for {resource}: {e}"))
                });
            }

            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            Err(Error::remote_create(
                resource,
                describe_api_error(status.as_u16(), &body),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_structured_errors() {
        let body = r#"{"error":{"code":409,"message":"Already Exists: Dataset acme-eu:sx_42","status":"ALREADY_EXISTS"}}"#;
        assert_eq!(
            describe_api_error(409, body),
            "Already Exists: Dataset acme-eu:sx_42 (ALREADY_EXISTS)"
        );
    }

    #[test]
    fn describes_unstructured_errors() {
        assert_eq!(
            describe_api_error(502, "Bad Gateway\n"),
            "HTTP 502: Bad Gateway"
        );
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_secs(600)), "600s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }
}
