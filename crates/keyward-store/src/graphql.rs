//! Minimal GraphQL-over-HTTP client.
//!
//! Sends `{query, variables}` to the backend with the admin secret header
//! and unwraps the `{data, errors}` response envelope.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Header carrying the backend admin secret.
pub const ADMIN_SECRET_HEADER: &str = "x-hasura-admin-secret";

/// Error code the backend uses for unique and foreign-key violations.
const CONSTRAINT_VIOLATION: &str = "constraint-violation";

/// Connection settings for the GraphQL backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct GraphqlConfig {
    /// GraphQL endpoint URL.
    pub endpoint: String,
    /// Admin secret sent with every request.
    #[serde(default)]
    pub admin_secret: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    10
}

impl std::fmt::Debug for GraphqlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlConfig")
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

/// HTTP client bound to one GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    client: reqwest::Client,
    endpoint: String,
    admin_secret: Option<String>,
}

#[derive(Serialize)]
struct Request<'a, V> {
    query: &'a str,
    variables: V,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
    #[serde(default)]
    extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct ErrorExtensions {
    #[serde(default)]
    code: Option<String>,
}

impl GraphqlClient {
    /// Create a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &GraphqlConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(
            client,
            config.endpoint.clone(),
            config.admin_secret.clone(),
        ))
    }

    /// Create a client with a custom reqwest client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        admin_secret: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            admin_secret,
        }
    }

    /// Get the endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute a query or mutation and decode its `data`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` for constraint violations,
    /// `StoreError::Backend` for other GraphQL errors or non-success
    /// statuses, and `StoreError::Transport` if the request fails.
    pub async fn execute<V, T>(&self, query: &str, variables: V) -> Result<T>
    where
        V: Serialize + Send,
        T: DeserializeOwned,
    {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&Request { query, variables });
        if let Some(secret) = &self.admin_secret {
            request = request.header(ADMIN_SECRET_HEADER, secret);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "GraphQL endpoint returned an error status");
            return Err(StoreError::Backend(format!(
                "GraphQL endpoint returned status {status}"
            )));
        }

        let envelope: Envelope<T> = response.json().await?;
        if let Some(first) = envelope.errors.into_iter().next() {
            let code = first.extensions.and_then(|ext| ext.code);
            tracing::debug!(code = ?code, message = %first.message, "GraphQL error");
            return Err(if code.as_deref() == Some(CONSTRAINT_VIOLATION) {
                StoreError::Conflict(first.message)
            } else {
                StoreError::Backend(first.message)
            });
        }

        envelope
            .data
            .ok_or_else(|| StoreError::Serialization("response carried no data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> GraphqlClient {
        GraphqlClient::new(&GraphqlConfig {
            endpoint: format!("{}/v1/graphql", server.uri()),
            admin_secret: Some("s3cret".to_string()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn sends_admin_secret_and_decodes_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .and(header(ADMIN_SECRET_HEADER, "s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "value": 42 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(client.endpoint().ends_with("/v1/graphql"));
        let data: Value = client.execute("query { value }", json!({})).await.unwrap();
        assert_eq!(data["value"], 42);
    }

    #[tokio::test]
    async fn constraint_violation_maps_to_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{
                    "message": "Uniqueness violation",
                    "extensions": { "code": "constraint-violation" }
                }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result: Result<Value> = client.execute("mutation { x }", json!({})).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn other_errors_map_to_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{ "message": "field not found" }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result: Result<Value> = client.execute("query { nope }", json!({})).await;
        assert!(matches!(result, Err(StoreError::Backend(msg)) if msg == "field not found"));
    }

    #[tokio::test]
    async fn http_failure_maps_to_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result: Result<Value> = client.execute("query { x }", json!({})).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }
}
