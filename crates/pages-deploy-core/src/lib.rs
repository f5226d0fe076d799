//! Pure deployment-reconciliation logic for the pages-deploy CI step.
//!
//! Holds the wire-decoded deployment records, the branch/url/alias match
//! chain, the retention policy, the deploy-output URL extractor, and the
//! step-outcome taxonomy shared by the runtime flows. No I/O lives here.

pub mod config;
pub mod deployment_record;
pub mod fs_util;
pub mod pr_linkage;
pub mod step_outcome;
pub mod url_extract;

pub use config::{Credentials, DeployConfig, Operation};
pub use deployment_record::{
    criteria_chain, find_matching, locate_deployments, select_for_retention,
    split_production_protected, DeploymentRecord, MatchCriterion,
};
pub use pr_linkage::{derive_pr_linkage, PrLinkage};
pub use step_outcome::{DeletionReport, FlowReport, StepOutcome};
pub use url_extract::{extract_deployment_url, normalize_branch, DeployOutcome};
