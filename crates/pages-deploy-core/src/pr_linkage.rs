use serde_json::Value;

/// Pull-request context derived fresh each run from the trigger; nothing is
/// persisted between invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrLinkage {
    pub pr_number: u64,
    pub environment_name: String,
    pub sha: Option<String>,
}

fn pr_number_from_event(event_payload: &Value) -> Option<u64> {
    if let Some(number) = event_payload
        .get("pull_request")
        .and_then(|pr| pr.get("number"))
        .and_then(Value::as_u64)
    {
        return Some(number);
    }
    // Issue-comment triggers carry the PR number under `issue` with a
    // `pull_request` marker distinguishing PRs from plain issues.
    let issue = event_payload.get("issue")?;
    issue.get("pull_request")?;
    issue.get("number").and_then(Value::as_u64)
}

fn head_sha_from_event(event_payload: &Value) -> Option<String> {
    event_payload
        .get("pull_request")
        .and_then(|pr| pr.get("head"))
        .and_then(|head| head.get("sha"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

/// Reconstructs the PR linkage for this run. An explicit number wins over the
/// triggering event payload; `None` means the run is outside a PR context and
/// every annotation step becomes a logged no-op.
pub fn derive_pr_linkage(
    explicit_pr_number: Option<u64>,
    event_payload: Option<&Value>,
    environment: &str,
) -> Option<PrLinkage> {
    let pr_number = explicit_pr_number.or_else(|| event_payload.and_then(pr_number_from_event))?;
    Some(PrLinkage {
        pr_number,
        environment_name: format!("{environment}/pr-{pr_number}"),
        sha: event_payload.and_then(head_sha_from_event),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unit_explicit_pr_number_wins_over_event_payload() {
        let payload = json!({ "pull_request": { "number": 7 } });
        let linkage = derive_pr_linkage(Some(42), Some(&payload), "preview").expect("linkage");
        assert_eq!(linkage.pr_number, 42);
        assert_eq!(linkage.environment_name, "preview/pr-42");
    }

    #[test]
    fn unit_pull_request_event_supplies_number_and_head_sha() {
        let payload = json!({
            "pull_request": { "number": 7, "head": { "sha": "abc123" } }
        });
        let linkage = derive_pr_linkage(None, Some(&payload), "preview").expect("linkage");
        assert_eq!(linkage.pr_number, 7);
        assert_eq!(linkage.sha.as_deref(), Some("abc123"));
    }

    #[test]
    fn unit_issue_comment_on_pr_supplies_number() {
        let payload = json!({
            "issue": { "number": 11, "pull_request": { "url": "https://api.github.com/..." } }
        });
        let linkage = derive_pr_linkage(None, Some(&payload), "preview").expect("linkage");
        assert_eq!(linkage.pr_number, 11);
        assert!(linkage.sha.is_none());
    }

    #[test]
    fn unit_issue_comment_on_plain_issue_is_not_a_pr_context() {
        let payload = json!({ "issue": { "number": 11 } });
        assert!(derive_pr_linkage(None, Some(&payload), "preview").is_none());
    }

    #[test]
    fn unit_no_context_yields_no_linkage() {
        assert!(derive_pr_linkage(None, None, "preview").is_none());
    }
}
