use std::time::Duration;

use futures_util::future::join_all;
use tracing::{info, warn};

use pages_deploy_core::{
    config::write_headers_sidecar, criteria_chain, extract_deployment_url, locate_deployments,
    select_for_retention, split_production_protected, Credentials, DeletionReport, DeployConfig,
    DeploymentRecord, FlowReport, Operation, StepOutcome,
};

use crate::api_error::{ApiError, CLOUDFLARE_TOO_MANY_DEPLOYMENTS_CODE};
use crate::cloudflare_api_client::CloudflareApiClient;
use crate::pr_annotator::PrAnnotator;
use crate::wrangler::WranglerRunner;


/// Sequences one invocation through its lifecycle flow. Stateless between
/// runs: all state lives on the remote platforms and is re-fetched every
/// time. The fatal/best-effort split follows the error taxonomy — only the
/// steps recorded as fatal abort the run.
pub struct Orchestrator {
    config: DeployConfig,
    credentials: Credentials,
    cloudflare: CloudflareApiClient,
    annotator: PrAnnotator,
    wrangler: WranglerRunner,
}

impl Orchestrator {
    pub fn new(
        config: DeployConfig,
        credentials: Credentials,
        cloudflare: CloudflareApiClient,
        annotator: PrAnnotator,
        wrangler: WranglerRunner,
    ) -> Self {
        Self {
            config,
            credentials,
            cloudflare,
            annotator,
            wrangler,
        }
    }

    pub async fn run(&self) -> FlowReport {
        info!(
            operation = self.config.operation.label(),
            project = %self.config.project,
            "starting flow"
        );
        match self.config.operation {
            Operation::Deploy => self.deploy_flow().await,
            Operation::DeleteDeployment => self.delete_deployment_flow().await,
            Operation::DeleteProject => self.delete_project_flow().await,
        }
    }

    async fn deploy_flow(&self) -> FlowReport {
        let mut report = FlowReport::default();

        // Artifact access is checked before any network call so a missing
        // build directory can never leave partial remote side effects.
        if !self.config.artifact_dir.is_dir() {
            report.record(
                "check_artifact_dir",
                StepOutcome::Fatal(format!(
                    "artifact directory '{}' does not exist or is not readable",
                    self.config.artifact_dir.display()
                )),
            );
            return report;
        }
        report.record("check_artifact_dir", StepOutcome::Ok);

        match self.cloudflare.get_project(&self.config.project).await {
            Ok(Some(_)) => report.record("check_project", StepOutcome::Ok),
            Ok(None) if self.config.create_project => {
                match self
                    .cloudflare
                    .create_project(&self.config.project, &self.config.branch)
                    .await
                {
                    Ok(()) => {
                        info!(project = %self.config.project, "created missing project");
                        report.record("create_project", StepOutcome::Ok);
                    }
                    Err(error) => {
                        report.record(
                            "create_project",
                            StepOutcome::Fatal(format!("project creation failed: {error}")),
                        );
                        return report;
                    }
                }
            }
            Ok(None) => {
                report.record(
                    "check_project",
                    StepOutcome::Fatal(format!(
                        "project '{}' does not exist and create-project is disabled",
                        self.config.project
                    )),
                );
                return report;
            }
            Err(error) => {
                report.record(
                    "check_project",
                    StepOutcome::Fatal(format!("project lookup failed: {error}")),
                );
                return report;
            }
        }

        if let Some(headers_json) = self.config.headers_json.as_deref() {
            match write_headers_sidecar(&self.config.artifact_dir, headers_json) {
                Ok(path) => {
                    info!(path = %path.display(), "wrote custom headers sidecar");
                    report.record("write_headers", StepOutcome::Ok);
                }
                Err(error) => {
                    warn!(%error, "failed to process custom headers");
                    report.record("write_headers", StepOutcome::Warning(error.to_string()));
                }
            }
        }

        let raw_output = match self
            .wrangler
            .deploy(
                &self.config.artifact_dir,
                &self.config.project,
                &self.config.branch,
                &self.credentials,
            )
            .await
        {
            Ok(output) => {
                report.record("upload", StepOutcome::Ok);
                output
            }
            Err(error) => {
                report.record("upload", StepOutcome::Fatal(error.to_string()));
                return report;
            }
        };

        let outcome =
            extract_deployment_url(&raw_output, &self.config.branch, &self.config.project);
        if outcome.was_guessed {
            warn!(
                url = %outcome.url,
                "deployment url was constructed from convention, not parsed from tool output"
            );
            report.record(
                "extract_url",
                StepOutcome::Warning("deployment url is a constructed guess".to_string()),
            );
        } else {
            report.record("extract_url", StepOutcome::Ok);
        }
        info!(url = %outcome.url, "resolved deployment url");
        report.url = Some(outcome.url.clone());

        if self.config.cleanup_old_deployments {
            let cleanup = self.retention_cleanup(true).await;
            report.record("cleanup_old_deployments", cleanup);
        }

        let link = self
            .annotator
            .link_deployment(&outcome.url, &self.config.branch)
            .await;
        report.record("link_pr", link);

        if self.config.comment_on_deploy {
            let body = format!(
                "Deployed `{}` ({}) to {}",
                self.config.project, self.config.branch, outcome.url
            );
            let comment = self.annotator.post_comment(&body).await;
            report.record("comment", comment);
        }

        report
    }

    async fn delete_deployment_flow(&self) -> FlowReport {
        let mut report = FlowReport::default();

        match self.locate_matching().await {
            Ok(Some(matched)) => {
                report.record("locate", StepOutcome::Ok);
                let deletion = self.delete_fan_out(matched).await;
                info!(summary = %deletion.summary(), "deployment deletion finished");
                if deletion.failed.is_empty() {
                    report.record("delete", StepOutcome::Ok);
                } else {
                    let failures: Vec<String> = deletion
                        .failed
                        .iter()
                        .map(|(id, reason)| format!("{id}: {reason}"))
                        .collect();
                    report.record(
                        "delete",
                        StepOutcome::Warning(format!(
                            "{}; failures: {}",
                            deletion.summary(),
                            failures.join("; ")
                        )),
                    );
                }
            }
            Ok(None) => {
                info!(
                    project = %self.config.project,
                    branch = %self.config.branch,
                    "no deployments matched the selector; nothing to delete"
                );
                report.record("locate", StepOutcome::Ok);
            }
            Err(error) => {
                warn!(%error, "failed to list deployments; skipping deletion");
                report.record("locate", StepOutcome::Warning(error.to_string()));
            }
        }

        self.pr_cleanup(&mut report).await;
        report
    }

    async fn delete_project_flow(&self) -> FlowReport {
        let mut report = FlowReport::default();

        match self.cloudflare.delete_project(&self.config.project).await {
            Ok(()) => {
                info!(project = %self.config.project, "deleted project");
                report.record("delete_project", StepOutcome::Ok);
            }
            Err(error) if error.is_not_found() => {
                info!(
                    project = %self.config.project,
                    "project already absent; nothing to delete"
                );
                report.record("delete_project", StepOutcome::Ok);
            }
            Err(error)
                if error.has_cloudflare_error_code(CLOUDFLARE_TOO_MANY_DEPLOYMENTS_CODE) =>
            {
                info!(
                    project = %self.config.project,
                    "project holds too many deployments; running bulk cleanup before retry"
                );
                // Production is not protected here: the whole project is
                // going away, so old production records are force-deleted.
                let cleanup = self.retention_cleanup(false).await;
                report.record("bulk_cleanup", cleanup);
                // Exactly one retry after the cleanup pass.
                match self.cloudflare.delete_project(&self.config.project).await {
                    Ok(()) => report.record("delete_project_retry", StepOutcome::Ok),
                    Err(retry_error) if retry_error.is_not_found() => {
                        report.record("delete_project_retry", StepOutcome::Ok);
                    }
                    Err(retry_error) => {
                        warn!(error = %retry_error, "project deletion retry failed");
                        report.record(
                            "delete_project_retry",
                            StepOutcome::Warning(retry_error.to_string()),
                        );
                    }
                }
            }
            Err(error) => {
                warn!(%error, "project deletion failed");
                report.record("delete_project", StepOutcome::Warning(error.to_string()));
            }
        }

        self.pr_cleanup(&mut report).await;
        report
    }

    async fn pr_cleanup(&self, report: &mut FlowReport) {
        let unlink = self.annotator.unlink_deployment().await;
        report.record("unlink_pr", unlink);
        if self.config.comment_on_cleanup {
            let body = format!(
                "Removed preview deployment(s) of `{}` for branch `{}`",
                self.config.project, self.config.branch
            );
            let comment = self.annotator.post_comment(&body).await;
            report.record("comment", comment);
        }
    }

    async fn locate_matching(&self) -> Result<Option<Vec<DeploymentRecord>>, ApiError> {
        let deployments = self.cloudflare.list_deployments(&self.config.project).await?;
        let chain = criteria_chain(&self.config.branch, self.config.deployment_prefix.as_deref());
        Ok(locate_deployments(&deployments, &chain).map(|(matched, criterion)| {
            info!(?criterion, matched = matched.len(), "located deployments");
            matched
        }))
    }

    /// Concurrent deletion fan-out. Records are independent, so requests run
    /// in parallel and each outcome is captured individually; one failure
    /// never hides the rest.
    async fn delete_fan_out(&self, matched: Vec<DeploymentRecord>) -> DeletionReport {
        let (deletable, protected) = split_production_protected(matched);
        let mut outcome = DeletionReport {
            skipped_production: protected.iter().map(|record| record.id.clone()).collect(),
            ..DeletionReport::default()
        };
        for record in &protected {
            warn!(id = %record.id, "skipping production deployment");
        }

        let deletions = deletable.iter().map(|record| {
            let id = record.id.clone();
            async move {
                let result = self
                    .cloudflare
                    .delete_deployment(&self.config.project, &id, false)
                    .await;
                (id, result)
            }
        });
        for (id, result) in join_all(deletions).await {
            match result {
                Ok(()) => outcome.deleted.push(id),
                Err(error) if error.is_not_found() => {
                    // Already gone counts as done.
                    outcome.deleted.push(id);
                }
                Err(error) => outcome.failed.push((id, error.to_string())),
            }
        }
        outcome
    }

    /// Sequential oldest-first cleanup keeping the `keep_count` most recent
    /// records. With `protect_production` the single most recent production
    /// record is always retained; without it, production records are
    /// force-deleted. Sequential (with the optional fixed delay) so the
    /// platform is not hammered during bulk passes.
    async fn retention_cleanup(&self, protect_production: bool) -> StepOutcome {
        let deployments = match self.cloudflare.list_deployments(&self.config.project).await {
            Ok(deployments) => deployments,
            Err(error) => {
                warn!(%error, "failed to list deployments for cleanup");
                return StepOutcome::Warning(error.to_string());
            }
        };
        let (kept, mut to_delete) =
            select_for_retention(&deployments, self.config.keep_count, protect_production);
        if to_delete.is_empty() {
            info!(kept = kept.len(), "retention cleanup found nothing to delete");
            return StepOutcome::Ok;
        }
        // select_for_retention yields newest-first; bulk passes delete the
        // oldest records first.
        to_delete.reverse();

        let mut failures = Vec::new();
        let mut deleted = 0_usize;
        for (index, record) in to_delete.iter().enumerate() {
            if index > 0 && self.config.delete_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.delete_delay_ms)).await;
            }
            let force = record.is_production;
            match self
                .cloudflare
                .delete_deployment(&self.config.project, &record.id, force)
                .await
            {
                Ok(()) => deleted += 1,
                Err(error) if error.is_not_found() => deleted += 1,
                Err(error) => {
                    warn!(id = %record.id, %error, "failed to delete old deployment");
                    failures.push(format!("{}: {error}", record.id));
                }
            }
        }
        info!(deleted, kept = kept.len(), "retention cleanup finished");
        if failures.is_empty() {
            StepOutcome::Ok
        } else {
            StepOutcome::Warning(format!("retention cleanup: {}", failures.join("; ")))
        }
    }
}
