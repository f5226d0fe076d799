use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api_error::{bounded_body, ApiError};

const PLATFORM: &str = "github";
const DEPLOYMENTS_PER_PAGE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
/// `owner/name` pair identifying the repository whose PR is annotated.
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.trim().split('/');
        let (Some(owner), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
            bail!("repository must be in owner/name form, got '{raw}'");
        };
        if owner.is_empty() || name.is_empty() {
            bail!("repository must be in owner/name form, got '{raw}'");
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GithubDeploymentResponse {
    id: u64,
}

/// Client for the slice of the GitHub REST API the PR annotator needs:
/// deployments, deployment statuses, and issue comments.
#[derive(Clone)]
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
}

impl GithubApiClient {
    pub fn new(api_base: String, token: &str, repo: RepoRef) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("pages-deploy"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        let mut auth_value = reqwest::header::HeaderValue::from_str(&auth_header)
            .context("invalid github authorization header")?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http: client,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo,
        })
    }

    fn repo_path(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.repo.owner, self.repo.name, tail
        )
    }

    /// Creates a deployment record against the given ref. Preview
    /// environments are marked transient so the platform can reap them.
    pub async fn create_deployment(
        &self,
        git_ref: &str,
        environment_name: &str,
        transient: bool,
    ) -> Result<u64, ApiError> {
        let payload = json!({
            "ref": git_ref,
            "environment": environment_name,
            "auto_merge": false,
            "required_contexts": [],
            "transient_environment": transient,
        });
        let request = self.http.post(self.repo_path("deployments")).json(&payload);
        let value = self.request_json("create deployment", request).await?;
        let decoded: GithubDeploymentResponse =
            serde_json::from_value(value).map_err(|error| ApiError::Decode {
                platform: PLATFORM,
                operation: "create deployment".to_string(),
                detail: error.to_string(),
            })?;
        Ok(decoded.id)
    }

    pub async fn create_deployment_status(
        &self,
        deployment_id: u64,
        state: &str,
        environment_url: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut payload = json!({ "state": state });
        if let Some(url) = environment_url {
            payload["environment_url"] = Value::String(url.to_string());
        }
        let request = self
            .http
            .post(self.repo_path(&format!("deployments/{deployment_id}/statuses")))
            .json(&payload);
        self.request_json("create deployment status", request)
            .await
            .map(|_| ())
    }

    /// Lists every deployment id recorded under the environment name,
    /// walking all pages.
    pub async fn list_deployments_for_environment(
        &self,
        environment_name: &str,
    ) -> Result<Vec<u64>, ApiError> {
        let mut page = 1_u32;
        let mut ids = Vec::new();
        loop {
            let request = self.http.get(self.repo_path("deployments")).query(&[
                ("environment", environment_name.to_string()),
                ("per_page", DEPLOYMENTS_PER_PAGE.to_string()),
                ("page", page.to_string()),
            ]);
            let value = self.request_json("list deployments", request).await?;
            let chunk: Vec<GithubDeploymentResponse> = serde_json::from_value(value)
                .map_err(|error| ApiError::Decode {
                    platform: PLATFORM,
                    operation: "list deployments".to_string(),
                    detail: error.to_string(),
                })?;
            let chunk_len = chunk.len();
            ids.extend(chunk.into_iter().map(|entry| entry.id));
            if chunk_len < DEPLOYMENTS_PER_PAGE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(ids)
    }

    pub async fn create_issue_comment(&self, issue_number: u64, body: &str) -> Result<(), ApiError> {
        let payload = json!({ "body": body });
        let request = self
            .http
            .post(self.repo_path(&format!("issues/{issue_number}/comments")))
            .json(&payload);
        self.request_json("create issue comment", request)
            .await
            .map(|_| ())
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
