//! Deployment API client implementation.
//!
//! This module provides the HTTP client for the hosted database REST API.
//! Every request and response is emitted as a `trace` event on the
//! [`CAPTURE_TARGET`] target so it can be written to a capture file.

use async_trait::async_trait;
use reqwest::{Client, Method, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{ApiError, ProvisionerError, Result};

use super::api::DeploymentApi;
use super::types::{
    Account, Cluster, CreateDeploymentRequest, Datacenter, Deployment, Embedded, Recipe,
    Scalings, TeamRoleEntry,
};

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.compose.io/2016-07";

/// Tracing target for raw request/response capture.
pub const CAPTURE_TARGET: &str = "api_capture";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for idempotent reads.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Hosted database API client.
#[derive(Debug, Clone)]
pub struct DbaasClient {
    /// HTTP client.
    client: Client,
    /// API key.
    api_key: String,
    /// Base URL without trailing slash.
    base_url: String,
}

#[derive(Deserialize)]
struct AccountsBody {
    accounts: Vec<Account>,
}

#[derive(Deserialize)]
struct ClustersBody {
    clusters: Vec<Cluster>,
}

#[derive(Deserialize)]
struct DatacentersBody {
    datacenters: Vec<Datacenter>,
}

#[derive(Deserialize)]
struct DeploymentsBody {
    deployments: Vec<Deployment>,
}

#[derive(Deserialize)]
struct TeamRolesBody {
    team_roles: Vec<TeamRoleEntry>,
}

impl DbaasClient {
    /// Creates a client against the default API URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_API_URL)
    }

    /// Creates a client against a custom API URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Executes an idempotent GET, retrying transient failures.
    ///
    /// A rate-limited response waits for its `Retry-After` delay.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if let Some(delay) = last_error.as_ref().map(|e| retry_delay(e, attempt)) {
                debug!("Retry attempt {attempt} of {MAX_RETRIES} for GET {path} in {delay:?}");
                tokio::time::sleep(delay).await;
            }

            match self.send_once::<T>(Method::GET, path, None).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ApiError::network("Max retries exceeded").into()))
    }

    /// Executes a mutating request exactly once.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        self.send_once(method, path, body).await
    }

    /// Executes a single HTTP request.
    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let body_text = body.as_ref().map(Value::to_string).unwrap_or_default();
        trace!(target: CAPTURE_TARGET, method = %method, url = %url, body = %body_text, "request");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key));
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read response body: {e}")))?;
        trace!(
            target: CAPTURE_TARGET,
            method = %method,
            url = %url,
            status = status.as_u16(),
            body = %text,
            "response"
        );

        match status.as_u16() {
            429 => {
                return Err(ApiError::RateLimited {
                    retry_after_secs: retry_after.filter(|s| *s > 0).unwrap_or(60),
                }
                .into());
            }
            401 | 403 => {
                return Err(ApiError::AuthenticationFailed {
                    message: String::from("Invalid API key"),
                }
                .into());
            }
            404 => {
                return Err(ApiError::NotFound {
                    resource: "resource",
                    id: path.to_string(),
                }
                .into());
            }
            _ => {}
        }

        if !status.is_success() {
            return Err(ApiError::api_error(status.as_u16(), extract_error_message(&text)).into());
        }

        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            ProvisionerError::from(ApiError::InvalidResponse {
                message: format!("Failed to parse response from {path}: {e}"),
            })
        })
    }
}

/// Delay before retry `attempt`: the server's hint when it gave one, otherwise
/// a linear backoff.
fn retry_delay(error: &ProvisionerError, attempt: u32) -> Duration {
    error.retry_delay_secs().map_or_else(
        || Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)),
        Duration::from_secs,
    )
}

/// Pulls a readable message out of an error body, falling back to the raw text.
fn extract_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };

    match value.get("errors") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
        None => body.to_string(),
    }
}

#[async_trait]
impl DeploymentApi for DbaasClient {
    async fn account(&self) -> Result<Account> {
        let body: Embedded<AccountsBody> = self.get("accounts").await?;
        body.embedded.accounts.into_iter().next().ok_or_else(|| {
            ApiError::InvalidResponse {
                message: String::from("No account associated with this API key"),
            }
            .into()
        })
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>> {
        let body: Embedded<ClustersBody> = self.get("clusters").await?;
        Ok(body.embedded.clusters)
    }

    async fn list_datacenters(&self) -> Result<Vec<Datacenter>> {
        let body: Embedded<DatacentersBody> = self.get("datacenters").await?;
        Ok(body.embedded.datacenters)
    }

    async fn list_deployments(&self) -> Result<Vec<Deployment>> {
        let body: Embedded<DeploymentsBody> = self.get("deployments").await?;
        Ok(body.embedded.deployments)
    }

    async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment> {
        self.get(&format!("deployments/{deployment_id}")).await
    }

    async fn get_scalings(&self, deployment_id: &str) -> Result<Scalings> {
        self.get(&format!("deployments/{deployment_id}/scalings")).await
    }

    async fn list_team_roles(&self, deployment_id: &str) -> Result<Vec<TeamRoleEntry>> {
        let body: Embedded<TeamRolesBody> =
            self.get(&format!("deployments/{deployment_id}/team_roles")).await?;
        Ok(body.embedded.team_roles)
    }

    async fn create_deployment(&self, request: &CreateDeploymentRequest) -> Result<Deployment> {
        self.send(
            Method::POST,
            "deployments",
            Some(json!({ "deployment": request })),
        )
        .await
    }

    async fn update_version(&self, deployment_id: &str, version: &str) -> Result<Recipe> {
        self.send(
            Method::PATCH,
            &format!("deployments/{deployment_id}/versions"),
            Some(json!({ "deployment": { "version": version } })),
        )
        .await
    }

    async fn set_scalings(&self, deployment_id: &str, units: u32) -> Result<Recipe> {
        self.send(
            Method::POST,
            &format!("deployments/{deployment_id}/scalings"),
            Some(json!({ "deployment": { "units": units } })),
        )
        .await
    }

    async fn update_tags(&self, deployment_id: &str, tags: &[String]) -> Result<()> {
        let _: Value = self
            .send(
                Method::PATCH,
                &format!("deployments/{deployment_id}/tags"),
                Some(json!({ "deployment": { "tags": tags } })),
            )
            .await?;
        Ok(())
    }

    async fn grant_team_role(
        &self,
        deployment_id: &str,
        team_id: &str,
        role: &str,
    ) -> Result<()> {
        let _: Value = self
            .send(
                Method::POST,
                &format!("deployments/{deployment_id}/team_roles"),
                Some(json!({ "team_role": { "name": role, "team_id": team_id } })),
            )
            .await?;
        Ok(())
    }

    async fn get_recipe(&self, recipe_id: &str) -> Result<Recipe> {
        self.get(&format!("recipes/{recipe_id}")).await
    }

    async fn delete_deployment(&self, deployment_id: &str) -> Result<Recipe> {
        self.send(
            Method::DELETE,
            &format!("deployments/{deployment_id}"),
            None,
        )
        .await
    }
}
