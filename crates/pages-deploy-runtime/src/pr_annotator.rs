use tracing::{info, warn};

use pages_deploy_core::{PrLinkage, StepOutcome};

use crate::github_api_client::GithubApiClient;

/// Best-effort PR annotation. Every operation is a logged no-op outside a
/// pull-request trigger context, and every failure degrades to a warning:
/// annotations are enrichments, never core deliverables.
pub struct PrAnnotator {
    client: Option<GithubApiClient>,
    linkage: Option<PrLinkage>,
}

impl PrAnnotator {
    pub fn new(client: Option<GithubApiClient>, linkage: Option<PrLinkage>) -> Self {
        Self { client, linkage }
    }

    fn context(&self) -> Option<(&GithubApiClient, &PrLinkage)> {
        match (self.client.as_ref(), self.linkage.as_ref()) {
            (Some(client), Some(linkage)) => Some((client, linkage)),
            _ => {
                info!("no pull-request context; skipping PR annotation");
                None
            }
        }
    }

    /// Creates a GitHub deployment for the PR head and marks it live at
    /// `url`. Falls back to the branch ref when the trigger carried no sha.
    pub async fn link_deployment(&self, url: &str, branch: &str) -> StepOutcome {
        let Some((client, linkage)) = self.context() else {
            return StepOutcome::Ok;
        };
        let git_ref = linkage.sha.as_deref().unwrap_or(branch);
        let transient = !linkage.environment_name.starts_with("production");
        let deployment_id = match client
            .create_deployment(git_ref, &linkage.environment_name, transient)
            .await
        {
            Ok(id) => id,
            Err(error) => {
                warn!(%error, "failed to create PR deployment record");
                return StepOutcome::Warning(format!("link deployment: {error}"));
            }
        };
        if let Err(error) = client
            .create_deployment_status(deployment_id, "success", Some(url))
            .await
        {
            warn!(%error, deployment_id, "failed to mark PR deployment live");
            return StepOutcome::Warning(format!("link deployment status: {error}"));
        }
        info!(
            deployment_id,
            environment = %linkage.environment_name,
            "linked deployment to PR"
        );
        StepOutcome::Ok
    }

    /// Marks every deployment record for the derived environment name
    /// inactive. Individual status failures are collected, not fatal.
    pub async fn unlink_deployment(&self) -> StepOutcome {
        let Some((client, linkage)) = self.context() else {
            return StepOutcome::Ok;
        };
        let ids = match client
            .list_deployments_for_environment(&linkage.environment_name)
            .await
        {
            Ok(ids) => ids,
            Err(error) => {
                warn!(%error, "failed to list PR deployments for unlink");
                return StepOutcome::Warning(format!("unlink deployment: {error}"));
            }
        };
        if ids.is_empty() {
            info!(environment = %linkage.environment_name, "no PR deployments to unlink");
            return StepOutcome::Ok;
        }
        let mut failures = Vec::new();
        for id in ids {
            if let Err(error) = client.create_deployment_status(id, "inactive", None).await {
                warn!(%error, deployment_id = id, "failed to deactivate PR deployment");
                failures.push(format!("{id}: {error}"));
            }
        }
        if failures.is_empty() {
            StepOutcome::Ok
        } else {
            StepOutcome::Warning(format!("unlink deployment: {}", failures.join("; ")))
        }
    }

    /// Posts a comment on the PR. Repeat invocations post repeat comments;
    /// deduplication is deliberately not attempted.
    pub async fn post_comment(&self, body: &str) -> StepOutcome {
        let Some((client, linkage)) = self.context() else {
            return StepOutcome::Ok;
        };
        match client.create_issue_comment(linkage.pr_number, body).await {
            Ok(()) => StepOutcome::Ok,
            Err(error) => {
                warn!(%error, pr_number = linkage.pr_number, "failed to post PR comment");
                StepOutcome::Warning(format!("post comment: {error}"))
            }
        }
    }
}
