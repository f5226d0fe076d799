use std::sync::OnceLock;

use regex::Regex;

const PLATFORM_SUFFIX: &str = ".pages.dev";

/// Result of one deploy invocation. `was_guessed` marks a url that was
/// constructed from the branch/project convention instead of parsed out of
/// real tool output; callers must treat a guessed url as advisory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub url: String,
    pub was_guessed: bool,
}

/// Ordered matcher chain over raw wrangler output. Order matters: the alias
/// announcement and the completion announcement can appear in the same
/// output, and the more specific phrase must win. New vendor phrasings are
/// appended at the right priority without reordering existing entries.
/// Anchors are the phrase text itself; adjacent emoji and other decoration
/// are tolerated but never required.
fn url_matchers() -> &'static [Regex] {
    static MATCHERS: OnceLock<Vec<Regex>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        [
            r"Deployment alias URL:\s*(https://\S+)",
            r"Deployment complete![^\n]*?\s(https://\S+)",
            r"Successfully deployed to\s+(https://\S+)",
            r"Take a peek over at\s+(https://\S+)",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("url matcher pattern is valid"))
        .collect()
    })
}

/// Lowercases and collapses every non-alphanumeric run to a single `-`,
/// matching the platform's branch-to-subdomain convention.
pub fn normalize_branch(branch: &str) -> String {
    let mut normalized = String::new();
    let mut last_was_dash = false;
    for ch in branch.chars() {
        if ch.is_ascii_alphanumeric() {
            normalized.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            normalized.push('-');
            last_was_dash = true;
        }
    }
    normalized.trim_matches('-').to_string()
}

fn fallback_url(branch: &str, project: &str) -> String {
    if branch == "main" {
        format!("https://{project}{PLATFORM_SUFFIX}")
    } else {
        format!(
            "https://{}.{project}{PLATFORM_SUFFIX}",
            normalize_branch(branch)
        )
    }
}

/// Recovers the canonical live url from raw deploy-tool output, falling back
/// to the deterministic `{branch}.{project}` construction when no known
/// phrase matches. Never fails.
pub fn extract_deployment_url(raw: &str, branch: &str, project: &str) -> DeployOutcome {
    for matcher in url_matchers() {
        if let Some(captures) = matcher.captures(raw) {
            if let Some(url) = captures.get(1) {
                return DeployOutcome {
                    url: url.as_str().trim().to_string(),
                    was_guessed: false,
                };
            }
        }
    }
    DeployOutcome {
        url: fallback_url(branch, project),
        was_guessed: true,
    }
}
