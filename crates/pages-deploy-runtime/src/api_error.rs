use serde_json::Value;
use thiserror::Error;

/// Cloudflare error code returned when a project still holds too many
/// deployments for a whole-project delete to proceed.
pub const CLOUDFLARE_TOO_MANY_DEPLOYMENTS_CODE: u64 = 8_000_035;

const ERROR_BODY_LIMIT: usize = 800;

/// Structured failure from either remote platform. A response outside 2xx
/// carries its status and body; a transport failure (DNS, TLS, timeout)
/// carries no status at all. Callers decide what a 404 means on their path;
/// the client never does.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{platform} api {operation} failed with status {status}: {body}")]
    Status {
        platform: &'static str,
        operation: String,
        status: u16,
        body: String,
    },
    #[error("{platform} api {operation} request failed: {source}")]
    Transport {
        platform: &'static str,
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{platform} api {operation} returned an undecodable body: {detail}")]
    Decode {
        platform: &'static str,
        operation: String,
        detail: String,
    },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Absence on a delete path is success, not failure; the distinction is
    /// drawn from the status code rather than the error path generically.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Checks the Cloudflare `errors[].code` list in the error body. Falls
    /// back to a message substring because the body shape drifts across API
    /// versions.
    pub fn has_cloudflare_error_code(&self, code: u64) -> bool {
        let ApiError::Status { body, .. } = self else {
            return false;
        };
        if let Ok(parsed) = serde_json::from_str::<Value>(body) {
            if let Some(errors) = parsed.get("errors").and_then(Value::as_array) {
                if errors
                    .iter()
                    .any(|entry| entry.get("code").and_then(Value::as_u64) == Some(code))
                {
                    return true;
                }
            }
        }
        code == CLOUDFLARE_TOO_MANY_DEPLOYMENTS_CODE
            && body.contains("too many deployments")
    }
}

/// Truncates a raw error body so one oversized response cannot flood the log.
pub(crate) fn truncate_for_error(body: &str, limit: usize) -> String {
    if body.chars().count() <= limit {
        return body.to_string();
    }
    let truncated: String = body.chars().take(limit).collect();
    format!("{truncated}… [truncated]")
}

pub(crate) fn bounded_body(body: String) -> String {
    truncate_for_error(&body, ERROR_BODY_LIMIT)
}
