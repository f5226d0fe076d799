//! I/O boundary and flow orchestration for the pages-deploy CI step.
//!
//! Wraps the Cloudflare management API, the GitHub REST API, and the
//! wrangler deploy subprocess behind typed clients, and sequences them
//! through the deploy and delete lifecycle flows.

pub mod api_error;
pub mod cloudflare_api_client;
pub mod github_api_client;
pub mod orchestrator;
pub mod pr_annotator;
pub mod wrangler;

pub use api_error::ApiError;
pub use cloudflare_api_client::CloudflareApiClient;
pub use github_api_client::{GithubApiClient, RepoRef};
pub use orchestrator::Orchestrator;
pub use pr_annotator::PrAnnotator;
pub use wrangler::WranglerRunner;
