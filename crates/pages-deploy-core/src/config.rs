use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::fs_util::write_text_atomic;

/// Sidecar file the custom-headers object is serialized into before upload.
pub const HEADERS_SIDECAR_FILE: &str = "_headers.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Top-level operation selector for one invocation.
pub enum Operation {
    Deploy,
    DeleteDeployment,
    DeleteProject,
}

impl Operation {
    /// Parses the selector; an unrecognized value is a fatal configuration
    /// error, not a default.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "deploy" => Ok(Operation::Deploy),
            "delete-deployment" => Ok(Operation::DeleteDeployment),
            "delete-project" => Ok(Operation::DeleteProject),
            other => bail!(
                "invalid operation '{other}'; expected deploy, delete-deployment, or delete-project"
            ),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Operation::Deploy => "deploy",
            Operation::DeleteDeployment => "delete-deployment",
            Operation::DeleteProject => "delete-project",
        }
    }
}

#[derive(Debug, Clone)]
/// Credentials built once at startup and passed by reference; never written
/// into the ambient process environment.
pub struct Credentials {
    pub cf_api_token: String,
    pub cf_account_id: String,
    pub github_token: Option<String>,
}

#[derive(Debug, Clone)]
/// Resolved invocation parameters shared by every flow.
pub struct DeployConfig {
    pub project: String,
    pub artifact_dir: PathBuf,
    pub branch: String,
    pub operation: Operation,
    pub environment: String,
    pub create_project: bool,
    pub cleanup_old_deployments: bool,
    pub comment_on_deploy: bool,
    pub comment_on_cleanup: bool,
    pub deployment_prefix: Option<String>,
    pub keep_count: usize,
    pub pr_number: Option<u64>,
    pub delete_delay_ms: u64,
    pub repository: Option<String>,
    pub headers_json: Option<String>,
}

impl DeployConfig {
    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            bail!("project is required");
        }
        if self.branch.trim().is_empty() {
            bail!("branch cannot be empty");
        }
        if self.operation == Operation::Deploy && self.artifact_dir.as_os_str().is_empty() {
            bail!("artifact directory is required for deploy");
        }
        if let Some(repository) = self.repository.as_deref() {
            if repository.split('/').filter(|part| !part.is_empty()).count() != 2 {
                bail!("repository must be in owner/name form, got '{repository}'");
            }
        }
        Ok(())
    }
}

/// Serializes the custom-headers object verbatim into the sidecar file
/// inside the artifact directory. The text must parse as a JSON object;
/// anything else is rejected before it can poison the upload.
pub fn write_headers_sidecar(artifact_dir: &Path, headers_json: &str) -> Result<PathBuf> {
    let parsed: Value = serde_json::from_str(headers_json)
        .context("custom headers are not valid JSON")?;
    if !parsed.is_object() {
        bail!("custom headers must be a JSON object mapping asset paths to header settings");
    }
    let sidecar_path = artifact_dir.join(HEADERS_SIDECAR_FILE);
    write_text_atomic(&sidecar_path, headers_json)
        .with_context(|| format!("failed to write {}", sidecar_path.display()))?;
    Ok(sidecar_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> DeployConfig {
        DeployConfig {
            project: "demo".to_string(),
            artifact_dir: PathBuf::from("dist"),
            branch: "main".to_string(),
            operation: Operation::Deploy,
            environment: "preview".to_string(),
            create_project: false,
            cleanup_old_deployments: false,
            comment_on_deploy: false,
            comment_on_cleanup: false,
            deployment_prefix: None,
            keep_count: 5,
            pr_number: None,
            delete_delay_ms: 0,
            repository: None,
            headers_json: None,
        }
    }

    #[test]
    fn unit_operation_parse_accepts_known_selectors() {
        assert_eq!(Operation::parse("deploy").expect("deploy"), Operation::Deploy);
        assert_eq!(
            Operation::parse("delete-deployment").expect("delete-deployment"),
            Operation::DeleteDeployment
        );
        assert_eq!(
            Operation::parse(" delete-project ").expect("delete-project"),
            Operation::DeleteProject
        );
    }

    #[test]
    fn unit_operation_label_round_trips_through_parse() {
        for operation in [
            Operation::Deploy,
            Operation::DeleteDeployment,
            Operation::DeleteProject,
        ] {
            assert_eq!(Operation::parse(operation.label()).expect("label"), operation);
        }
    }

    #[test]
    fn unit_operation_parse_rejects_unknown_selector() {
        let error = Operation::parse("destroy").expect_err("should reject");
        assert!(error.to_string().contains("invalid operation 'destroy'"));
    }

    #[test]
    fn unit_validate_rejects_missing_project_and_bad_repository() {
        let mut config = base_config();
        config.project = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.repository = Some("not-a-repo".to_string());
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.repository = Some("owner/name".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unit_write_headers_sidecar_rejects_non_object_payload() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(write_headers_sidecar(temp.path(), "[1,2]").is_err());
        assert!(write_headers_sidecar(temp.path(), "not json").is_err());
    }

    #[test]
    fn unit_write_headers_sidecar_writes_verbatim_text() {
        let temp = tempfile::tempdir().expect("tempdir");
        let raw = "{\"/assets/*\": {\"cache-control\": \"max-age=31536000\"}}";
        let path = write_headers_sidecar(temp.path(), raw).expect("sidecar");
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("_headers.json"));
        assert_eq!(std::fs::read_to_string(&path).expect("read"), raw);
    }
}
