use anyhow::{Context, Result};
use serde_json::{json, Value};

use pages_deploy_core::DeploymentRecord;

use crate::api_error::{bounded_body, ApiError};

const PLATFORM: &str = "cloudflare";
const DEPLOYMENTS_PER_PAGE: usize = 25;

/// Client for the Cloudflare Pages management API. Pure I/O boundary: typed
/// results or structured failures, no retries and no business logic — retry
/// policy belongs to the orchestrator because not every operation is safe to
/// repeat.
#[derive(Clone)]
pub struct CloudflareApiClient {
    http: reqwest::Client,
    api_base: String,
    account_id: String,
}

impl CloudflareApiClient {
    pub fn new(api_base: String, api_token: &str, account_id: String) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("pages-deploy"),
        );
        let auth_header = format!("Bearer {}", api_token.trim());
        let mut auth_value = reqwest::header::HeaderValue::from_str(&auth_header)
            .context("invalid cloudflare authorization header")?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to create cloudflare api client")?;
        Ok(Self {
            http: client,
            api_base: api_base.trim_end_matches('/').to_string(),
            account_id,
        })
    }

    fn project_path(&self, project: &str) -> String {
        format!(
            "{}/accounts/{}/pages/projects/{}",
            self.api_base, self.account_id, project
        )
    }

    /// Returns the project payload, or `None` when the API reports 404.
    pub async fn get_project(&self, project: &str) -> Result<Option<Value>, ApiError> {
        let request = self.http.get(self.project_path(project));
        match self.request_json("get project", request).await {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }

    pub async fn create_project(
        &self,
        project: &str,
        production_branch: &str,
    ) -> Result<(), ApiError> {
        let payload = json!({
            "name": project,
            "production_branch": production_branch,
        });
        let request = self
            .http
            .post(format!(
                "{}/accounts/{}/pages/projects",
                self.api_base, self.account_id
            ))
            .json(&payload);
        self.request_json("create project", request).await.map(|_| ())
    }

    pub async fn delete_project(&self, project: &str) -> Result<(), ApiError> {
        let request = self.http.delete(self.project_path(project));
        self.request_json("delete project", request).await.map(|_| ())
    }

    /// Fetches every page of deployments. Zero deployments is an empty
    /// sequence, never an error.
    pub async fn list_deployments(&self, project: &str) -> Result<Vec<DeploymentRecord>, ApiError> {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let request = self
                .http
                .get(format!("{}/deployments", self.project_path(project)))
                .query(&[
                    ("page", page.to_string()),
                    ("per_page", DEPLOYMENTS_PER_PAGE.to_string()),
                ]);
            let value = self.request_json("list deployments", request).await?;
            let chunk = value
                .get("result")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let chunk_len = chunk.len();
            for entry in &chunk {
                let record = DeploymentRecord::from_payload(entry).map_err(|error| {
                    ApiError::Decode {
                        platform: PLATFORM,
                        operation: "list deployments".to_string(),
                        detail: error.to_string(),
                    }
                })?;
                rows.push(record);
            }
            if chunk_len < DEPLOYMENTS_PER_PAGE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    /// Deletes one deployment by its opaque id. `force` is required by the
    /// platform when the record is the last production deployment of a
    /// project that is being emptied.
    pub async fn delete_deployment(
        &self,
        project: &str,
        deployment_id: &str,
        force: bool,
    ) -> Result<(), ApiError> {
        let mut request = self.http.delete(format!(
            "{}/deployments/{}",
            self.project_path(project),
            deployment_id
        ));
        if force {
            request = request.query(&[("force", "true")]);
        }
        self.request_json("delete deployment", request).await.map(|_| ())
    }

    async fn request_json(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, ApiError> {
        let response = request.send().await.map_err(|source| ApiError::Transport {
            platform: PLATFORM,
            operation: operation.to_string(),
            source,
        })?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ApiError::Status {
                platform: PLATFORM,
                operation: operation.to_string(),
                status: status.as_u16(),
                body: bounded_body(body),
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|error| ApiError::Decode {
            platform: PLATFORM,
            operation: operation.to_string(),
            detail: error.to_string(),
        })
    }
}
