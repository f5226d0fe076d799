use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::url_extract::normalize_branch;

#[derive(Debug, Clone, PartialEq, Eq)]
/// One remote deployment snapshot at query time. `id` is the only stable
/// identifier; url and aliases may be absent or inconsistent across calls
/// and must never be used as a primary key.
pub struct DeploymentRecord {
    pub id: String,
    pub created_on: DateTime<Utc>,
    pub branch: Option<String>,
    pub url: Option<String>,
    pub aliases: Vec<String>,
    pub is_production: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct DeploymentPayload {
    id: String,
    created_on: DateTime<Utc>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    aliases: Option<Vec<String>>,
    #[serde(default)]
    environment: Option<String>,
    #[serde(default)]
    deployment_trigger: Option<DeploymentTriggerPayload>,
}

#[derive(Debug, Clone, Deserialize)]
struct DeploymentTriggerPayload {
    #[serde(default)]
    metadata: Option<DeploymentTriggerMetadataPayload>,
}

#[derive(Debug, Clone, Deserialize)]
struct DeploymentTriggerMetadataPayload {
    #[serde(default)]
    branch: Option<String>,
}

impl DeploymentRecord {
    /// Decodes one entry of the Cloudflare deployment-list payload. Rows the
    /// API returns without an id or timestamp are rejected rather than
    /// silently defaulted, since every downstream decision keys on them.
    pub fn from_payload(value: &Value) -> Result<Self> {
        let payload: DeploymentPayload = serde_json::from_value(value.clone())
            .context("failed to decode deployment payload")?;
        let branch = payload
            .deployment_trigger
            .and_then(|trigger| trigger.metadata)
            .and_then(|metadata| metadata.branch)
            .filter(|branch| !branch.trim().is_empty());
        Ok(Self {
            id: payload.id,
            created_on: payload.created_on,
            branch,
            url: payload.url.filter(|url| !url.trim().is_empty()),
            aliases: payload.aliases.unwrap_or_default(),
            is_production: payload.environment.as_deref() == Some("production"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Selector used to pick a subset of deployments for deletion.
pub enum MatchCriterion {
    /// Deployment trigger metadata names exactly this branch.
    ExactBranch(String),
    /// Deployment url contains the normalized branch text. Plain substring
    /// containment: branch names that are substrings of one another can
    /// cross-match. Known correctness risk, pinned by regression test.
    UrlPattern(String),
    /// Some alias hostname starts with this prefix.
    AliasPrefix(String),
}

fn matches_criterion(record: &DeploymentRecord, criterion: &MatchCriterion) -> bool {
    match criterion {
        MatchCriterion::ExactBranch(branch) => record.branch.as_deref() == Some(branch.as_str()),
        MatchCriterion::UrlPattern(normalized) => record
            .url
            .as_deref()
            .is_some_and(|url| url.contains(normalized.as_str())),
        MatchCriterion::AliasPrefix(prefix) => record.aliases.iter().any(|alias| {
            alias
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .starts_with(prefix.as_str())
        }),
    }
}

/// Applies one criterion. Pure; empty input yields empty output for every
/// variant.
pub fn find_matching(
    deployments: &[DeploymentRecord],
    criterion: &MatchCriterion,
) -> Vec<DeploymentRecord> {
    deployments
        .iter()
        .filter(|record| matches_criterion(record, criterion))
        .cloned()
        .collect()
}

/// Builds the fallback chain for a branch selector: exact branch metadata
/// first, then the fuzzy normalized-branch url match, then the alias prefix
/// when one was supplied.
pub fn criteria_chain(branch: &str, prefix: Option<&str>) -> Vec<MatchCriterion> {
    let mut chain = vec![
        MatchCriterion::ExactBranch(branch.to_string()),
        MatchCriterion::UrlPattern(normalize_branch(branch)),
    ];
    if let Some(prefix) = prefix.map(str::trim).filter(|prefix| !prefix.is_empty()) {
        chain.push(MatchCriterion::AliasPrefix(prefix.to_string()));
    }
    chain
}

/// Resolves the criterion chain in strict priority order: later criteria are
/// consulted only when every earlier one matched nothing. Returns the matched
/// records together with the criterion that produced them.
pub fn locate_deployments(
    deployments: &[DeploymentRecord],
    chain: &[MatchCriterion],
) -> Option<(Vec<DeploymentRecord>, MatchCriterion)> {
    for criterion in chain {
        let matched = find_matching(deployments, criterion);
        if !matched.is_empty() {
            return Some((matched, criterion.clone()));
        }
    }
    None
}

/// Splits a matched set into deletable records and production records that
/// must be kept. A production record is deletable only when it is the sole
/// match, which is as close to "explicitly requested for that exact id" as a
/// branch-level selector gets.
pub fn split_production_protected(
    matched: Vec<DeploymentRecord>,
) -> (Vec<DeploymentRecord>, Vec<DeploymentRecord>) {
    if matched.len() == 1 {
        return (matched, Vec::new());
    }
    matched
        .into_iter()
        .partition(|record| !record.is_production)
}

fn sort_newest_first(deployments: &mut [DeploymentRecord]) {
    deployments.sort_by(|left, right| {
        right
            .created_on
            .cmp(&left.created_on)
            .then_with(|| left.id.cmp(&right.id))
    });
}

/// Retention policy for scheduled cleanup: keep the `keep_count` most recent
/// records, plus the single most recent production record when
/// `protect_production` is set, even if recency alone would evict it.
/// Deterministic: `created_on` ties break by `id` ascending.
pub fn select_for_retention(
    deployments: &[DeploymentRecord],
    keep_count: usize,
    protect_production: bool,
) -> (Vec<DeploymentRecord>, Vec<DeploymentRecord>) {
    let mut sorted = deployments.to_vec();
    sort_newest_first(&mut sorted);

    let protected_production_id = if protect_production {
        sorted
            .iter()
            .find(|record| record.is_production)
            .map(|record| record.id.clone())
    } else {
        None
    };

    let mut to_keep = Vec::new();
    let mut to_delete = Vec::new();
    for (index, record) in sorted.into_iter().enumerate() {
        let keep = index < keep_count
            || protected_production_id.as_deref() == Some(record.id.as_str());
        if keep {
            to_keep.push(record);
        } else {
            to_delete.push(record);
        }
    }
    (to_keep, to_delete)
}
