mod cli_args;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use pages_deploy_core::{derive_pr_linkage, Credentials, DeployConfig, Operation, StepOutcome};
use pages_deploy_runtime::{
    CloudflareApiClient, GithubApiClient, Orchestrator, PrAnnotator, RepoRef, WranglerRunner,
};

use crate::cli_args::Cli;

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn load_event_payload(cli: &Cli) -> Option<Value> {
    let path = cli.event_path.as_ref()?;
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(%error, path = %path.display(), "event payload is not valid JSON");
                None
            }
        },
        Err(error) => {
            warn!(%error, path = %path.display(), "failed to read event payload");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let operation = Operation::parse(&cli.operation)?;
    let config = DeployConfig {
        project: cli.project.clone(),
        artifact_dir: cli.artifact_dir.clone(),
        branch: cli.branch.clone(),
        operation,
        environment: cli.environment.clone(),
        create_project: cli.create_project,
        cleanup_old_deployments: cli.cleanup_old_deployments,
        comment_on_deploy: cli.comment_on_deploy,
        comment_on_cleanup: cli.comment_on_cleanup,
        deployment_prefix: cli.deployment_prefix.clone(),
        keep_count: cli.keep_count,
        pr_number: cli.pr_number,
        delete_delay_ms: cli.delete_delay_ms,
        repository: cli.repository.clone(),
        headers_json: cli.headers_json.clone(),
    };
    config.validate()?;

    let credentials = Credentials {
        cf_api_token: cli.cf_api_token.clone(),
        cf_account_id: cli.cf_account_id.clone(),
        github_token: cli.github_token.clone(),
    };

    let event_payload = load_event_payload(&cli);
    let linkage = derive_pr_linkage(config.pr_number, event_payload.as_ref(), &config.environment);

    let cloudflare = CloudflareApiClient::new(
        cli.cf_api_base.clone(),
        &credentials.cf_api_token,
        credentials.cf_account_id.clone(),
    )?;
    let github = match (credentials.github_token.as_deref(), config.repository.as_deref()) {
        (Some(token), Some(repository)) => {
            let repo = RepoRef::parse(repository)?;
            Some(GithubApiClient::new(cli.github_api_base.clone(), token, repo)?)
        }
        _ => None,
    };
    let annotator = PrAnnotator::new(github, linkage);
    let wrangler = WranglerRunner::with_program(cli.wrangler_bin.clone());

    let orchestrator = Orchestrator::new(config, credentials, cloudflare, annotator, wrangler);
    let report = orchestrator.run().await;

    for record in report.warnings() {
        if let StepOutcome::Warning(reason) = &record.outcome {
            warn!(step = record.step, reason = reason.as_str(), "step degraded");
        }
    }
    if let Some(fatal) = report.fatal() {
        if let StepOutcome::Fatal(reason) = &fatal.outcome {
            bail!("{} failed: {reason}", fatal.step);
        }
    }

    if operation == Operation::Deploy {
        let url = report
            .url
            .as_deref()
            .context("deploy flow finished without a resolved url")?;
        println!("{url}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with_event_path(path: &str) -> Cli {
        Cli::parse_from([
            "pages-deploy",
            "--project",
            "demo",
            "--artifact-dir",
            "dist",
            "--cf-api-token",
            "token",
            "--cf-account-id",
            "acct",
            "--event-path",
            path,
        ])
    }

    #[test]
    fn unit_load_event_payload_reads_valid_json() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("event.json");
        std::fs::write(&path, r#"{"pull_request":{"number":42}}"#).expect("write");
        let cli = cli_with_event_path(&path.to_string_lossy());
        let payload = load_event_payload(&cli).expect("payload");
        assert_eq!(payload["pull_request"]["number"], 42);
    }

    #[test]
    fn unit_load_event_payload_tolerates_invalid_json_and_missing_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("event.json");
        std::fs::write(&path, "not json").expect("write");
        let cli = cli_with_event_path(&path.to_string_lossy());
        assert!(load_event_payload(&cli).is_none());

        let missing = temp.path().join("does-not-exist.json");
        let cli = cli_with_event_path(&missing.to_string_lossy());
        assert!(load_event_payload(&cli).is_none());
    }
}
