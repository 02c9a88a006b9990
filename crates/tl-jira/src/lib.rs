//! Jira Cloud integration for timelog.
//!
//! Mirrors time entries as issue worklogs through the Atlassian REST API:
//! - Tenant (cloud id) discovery via the accessible-resources endpoint
//! - Worklog create/update/delete on an issue
//! - Issue existence checks when linking a project

use std::fmt;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tl_core::{IntegrationType, RemoteWorklogSync, WorklogBody};

/// Default request timeout for API calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Atlassian API gateway used for both tenant discovery and Jira calls.
pub const ATLASSIAN_API_URL: &str = "https://api.atlassian.com";

/// Jira client errors.
#[derive(Debug, Error)]
pub enum JiraError {
    /// The access token was unusable.
    #[error("invalid access token: {reason}")]
    InvalidToken { reason: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned a non-success status.
    #[error("Atlassian API error: {message} (status {status})")]
    Api { status: StatusCode, message: String },
    /// The token has no accessible Jira site.
    #[error("no accessible Atlassian resources for this token")]
    NoAccessibleResources,
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Connection settings for [`JiraClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraConfig {
    /// Base URL of the Atlassian API gateway, without trailing slash.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: ATLASSIAN_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Jira Cloud REST client.
///
/// Tokens are passed per call: one client serves every owner.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Clone)]
pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
}

impl fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl JiraClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &JiraConfig) -> Result<Self, JiraError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(JiraError::ClientBuild)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the cloud id of the first site the token can access.
    pub async fn resolve_tenant_id(&self, token: &str) -> Result<String, JiraError> {
        let url = format!("{}/oauth/token/accessible-resources", self.base_url);
        let resources: Vec<AccessibleResource> = self
            .send::<()>(Method::GET, &url, token, None)
            .await
            .and_then(|body| decode(&body))?;

        let resource = resources
            .into_iter()
            .next()
            .ok_or(JiraError::NoAccessibleResources)?;
        if resource.id.is_empty() {
            return Err(JiraError::InvalidResponse(
                "accessible resource without id".to_string(),
            ));
        }
        Ok(resource.id)
    }

    /// Checks whether `issue` exists on the tenant.
    pub async fn issue_exists(
        &self,
        token: &str,
        tenant: &str,
        issue: &str,
    ) -> Result<bool, JiraError> {
        let url = format!(
            "{}/ex/jira/{tenant}/rest/api/3/issue/{issue}",
            self.base_url
        );
        match self.send::<()>(Method::GET, &url, token, None).await {
            Ok(body) => {
                let issue: IssueResponse = decode(&body)?;
                Ok(!issue.key.is_empty())
            }
            Err(JiraError::Api {
                status: StatusCode::NOT_FOUND,
                ..
            }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Adds a worklog to `issue`, returning its id.
    pub async fn create_worklog(
        &self,
        token: &str,
        tenant: &str,
        issue: &str,
        body: WorklogBody<'_>,
    ) -> Result<String, JiraError> {
        let url = self.worklog_url(tenant, issue, None);
        let request = WorklogRequest::from(body);
        let body = self.send(Method::POST, &url, token, Some(&request)).await?;
        let worklog: WorklogResponse = decode(&body)?;
        tracing::debug!(issue, worklog_id = %worklog.id, "jira worklog created");
        Ok(worklog.id)
    }

    /// Replaces comment and time spent of a worklog, returning its id.
    pub async fn update_worklog(
        &self,
        token: &str,
        tenant: &str,
        issue: &str,
        worklog_id: &str,
        body: WorklogBody<'_>,
    ) -> Result<String, JiraError> {
        let url = self.worklog_url(tenant, issue, Some(worklog_id));
        let request = WorklogRequest::from(body);
        let body = self.send(Method::PUT, &url, token, Some(&request)).await?;
        let worklog: WorklogResponse = decode(&body)?;
        Ok(worklog.id)
    }

    /// Deletes a worklog.
    pub async fn delete_worklog(
        &self,
        token: &str,
        tenant: &str,
        issue: &str,
        worklog_id: &str,
    ) -> Result<(), JiraError> {
        let url = self.worklog_url(tenant, issue, Some(worklog_id));
        self.send::<()>(Method::DELETE, &url, token, None).await?;
        Ok(())
    }

    fn worklog_url(&self, tenant: &str, issue: &str, worklog_id: Option<&str>) -> String {
        let mut url = format!(
            "{}/ex/jira/{tenant}/rest/api/2/issue/{issue}/worklog",
            self.base_url
        );
        if let Some(id) = worklog_id {
            url.push('/');
            url.push_str(id);
        }
        url
    }

    /// Sends an authenticated request and returns the body of a 2xx response.
    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&B>,
    ) -> Result<String, JiraError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(JiraError::InvalidToken {
                reason: "access token cannot be empty",
            });
        }

        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::debug!(%method, url, %status, body = %text, "Atlassian API error response");
            return Err(parse_api_error(status, &text));
        }
        Ok(text)
    }
}

impl RemoteWorklogSync for JiraClient {
    type Error = JiraError;

    fn integration(&self) -> IntegrationType {
        IntegrationType::Jira
    }

    async fn resolve_tenant(&self, token: &str) -> Result<String, JiraError> {
        self.resolve_tenant_id(token).await
    }

    async fn create_worklog(
        &self,
        token: &str,
        tenant: &str,
        issue: &str,
        body: WorklogBody<'_>,
    ) -> Result<String, JiraError> {
        Self::create_worklog(self, token, tenant, issue, body).await
    }

    async fn update_worklog(
        &self,
        token: &str,
        tenant: &str,
        issue: &str,
        worklog_id: &str,
        body: WorklogBody<'_>,
    ) -> Result<String, JiraError> {
        Self::update_worklog(self, token, tenant, issue, worklog_id, body).await
    }

    async fn delete_worklog(
        &self,
        token: &str,
        tenant: &str,
        issue: &str,
        worklog_id: &str,
    ) -> Result<(), JiraError> {
        Self::delete_worklog(self, token, tenant, issue, worklog_id).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorklogRequest<'a> {
    comment: &'a str,
    time_spent_seconds: i64,
}

impl<'a> From<WorklogBody<'a>> for WorklogRequest<'a> {
    fn from(body: WorklogBody<'a>) -> Self {
        Self {
            comment: body.comment,
            time_spent_seconds: body.time_spent_seconds,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorklogResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AccessibleResource {
    id: String,
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    #[serde(default)]
    key: String,
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, JiraError> {
    serde_json::from_str(body).map_err(|err| JiraError::InvalidResponse(err.to_string()))
}

fn parse_api_error(status: StatusCode, body: &str) -> JiraError {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ErrorPayload {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        error_message: Option<String>,
        #[serde(default)]
        error_messages: Vec<String>,
    }

    let message = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| {
            payload
                .error
                .filter(|m| !m.is_empty())
                .or(payload.error_message.filter(|m| !m.is_empty()))
                .or_else(|| {
                    (!payload.error_messages.is_empty())
                        .then(|| payload.error_messages.join("; "))
                })
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });

    JiraError::Api { status, message }
}
