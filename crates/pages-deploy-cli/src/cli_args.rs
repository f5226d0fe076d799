use std::path::PathBuf;

use clap::Parser;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "pages-deploy",
    about = "Deploys a static site build to Cloudflare Pages and links the deployment to a pull request",
    version
)]
pub struct Cli {
    #[arg(long, env = "PAGES_PROJECT", help = "Cloudflare Pages project name")]
    pub project: String,

    #[arg(
        long = "artifact-dir",
        env = "PAGES_ARTIFACT_DIR",
        help = "Directory holding the built static assets to upload"
    )]
    pub artifact_dir: PathBuf,

    #[arg(
        long,
        env = "PAGES_BRANCH",
        default_value = "main",
        help = "Branch name the deployment belongs to"
    )]
    pub branch: String,

    #[arg(
        long,
        env = "PAGES_OPERATION",
        default_value = "deploy",
        help = "Operation to perform: deploy, delete-deployment, or delete-project"
    )]
    pub operation: String,

    #[arg(
        long,
        env = "PAGES_ENVIRONMENT",
        default_value = "preview",
        help = "Environment label used for PR deployment records (e.g. preview)"
    )]
    pub environment: String,

    #[arg(
        long = "create-project",
        default_value_t = false,
        help = "Create the project when it does not exist instead of failing"
    )]
    pub create_project: bool,

    #[arg(
        long = "cleanup-old-deployments",
        default_value_t = false,
        help = "After a successful deploy, delete deployments beyond --keep-count"
    )]
    pub cleanup_old_deployments: bool,

    #[arg(
        long = "comment-on-deploy",
        default_value_t = false,
        help = "Post a PR comment with the deployment url after a successful deploy"
    )]
    pub comment_on_deploy: bool,

    #[arg(
        long = "comment-on-cleanup",
        default_value_t = false,
        help = "Post a PR comment after deployments are cleaned up"
    )]
    pub comment_on_cleanup: bool,

    #[arg(
        long = "deployment-prefix",
        help = "Optional alias prefix used as the last-resort deployment selector"
    )]
    pub deployment_prefix: Option<String>,

    #[arg(
        long = "keep-count",
        default_value_t = 5,
        value_parser = parse_positive_usize,
        help = "How many recent deployments to retain during cleanup"
    )]
    pub keep_count: usize,

    #[arg(
        long = "pr-number",
        help = "Explicit pull-request number; falls back to the triggering event payload"
    )]
    pub pr_number: Option<u64>,

    #[arg(
        long = "delete-delay-ms",
        default_value_t = 0,
        help = "Fixed delay between sequential deletion requests. Concurrent CI runs against the same project are not coordinated"
    )]
    pub delete_delay_ms: u64,

    #[arg(
        long,
        env = "GITHUB_REPOSITORY",
        help = "Repository in owner/name form for PR annotation"
    )]
    pub repository: Option<String>,

    #[arg(
        long = "headers-json",
        help = "JSON object mapping asset paths to header settings, written into the artifact dir before upload"
    )]
    pub headers_json: Option<String>,

    #[arg(
        long = "cf-api-token",
        env = "CLOUDFLARE_API_TOKEN",
        hide_env_values = true,
        help = "Cloudflare API token with Pages permissions"
    )]
    pub cf_api_token: String,

    #[arg(
        long = "cf-account-id",
        env = "CLOUDFLARE_ACCOUNT_ID",
        help = "Cloudflare account id owning the project"
    )]
    pub cf_account_id: String,

    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub token used for PR annotation; omit to skip annotation"
    )]
    pub github_token: Option<String>,

    #[arg(
        long = "cf-api-base",
        env = "CLOUDFLARE_API_BASE",
        default_value = "https://api.cloudflare.com/client/v4",
        help = "Base URL for the Cloudflare management API"
    )]
    pub cf_api_base: String,

    #[arg(
        long = "github-api-base",
        env = "GITHUB_API_BASE",
        default_value = "https://api.github.com",
        help = "Base URL for the GitHub REST API"
    )]
    pub github_api_base: String,

    #[arg(
        long = "event-path",
        env = "GITHUB_EVENT_PATH",
        help = "Path to the triggering event payload used to infer the PR number"
    )]
    pub event_path: Option<PathBuf>,

    #[arg(
        long = "wrangler-bin",
        env = "PAGES_WRANGLER_BIN",
        default_value = "wrangler",
        help = "Deploy tool binary to invoke"
    )]
    pub wrangler_bin: String,
}
