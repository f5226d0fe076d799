use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::debug;

use pages_deploy_core::Credentials;

use crate::api_error::truncate_for_error;

const STDERR_TAIL_LIMIT: usize = 800;

/// Invokes the vendor deploy tool as a subprocess. Credentials are injected
/// on the child command only; the parent process environment is never
/// mutated. The program is overridable so tests can point at a stub script.
#[derive(Debug, Clone)]
pub struct WranglerRunner {
    program: String,
}

impl Default for WranglerRunner {
    fn default() -> Self {
        Self {
            program: "wrangler".to_string(),
        }
    }
}

impl WranglerRunner {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs `wrangler pages deploy` for the artifact directory and returns
    /// the combined tool output for url extraction. The directory must
    /// already have been validated by the caller; a non-zero exit here is
    /// fatal for the whole invocation.
    pub async fn deploy(
        &self,
        artifact_dir: &Path,
        project: &str,
        branch: &str,
        credentials: &Credentials,
    ) -> Result<String> {
        let mut command = Command::new(self.program.as_str());
        command
            .arg("pages")
            .arg("deploy")
            .arg(artifact_dir)
            .arg("--project-name")
            .arg(project)
            .arg("--branch")
            .arg(branch)
            .env("CLOUDFLARE_API_TOKEN", credentials.cf_api_token.as_str())
            .env("CLOUDFLARE_ACCOUNT_ID", credentials.cf_account_id.as_str())
            .kill_on_drop(true);

        debug!(program = %self.program, project, branch, "invoking deploy tool");
        let output = command
            .output()
            .await
            .with_context(|| format!("failed to spawn deploy tool '{}'", self.program))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            bail!(
                "deploy tool exited with {}: {}",
                output
                    .status
                    .code()
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                truncate_for_error(stderr.trim(), STDERR_TAIL_LIMIT)
            );
        }
        // Some wrangler versions announce the url on stderr.
        Ok(format!("{stdout}\n{stderr}"))
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            cf_api_token: "token".to_string(),
            cf_account_id: "acct".to_string(),
            github_token: None,
        }
    }

    fn write_stub(dir: &Path, name: &str, script: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, script).expect("write stub");
        let mut permissions = std::fs::metadata(&path).expect("stat").permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).expect("chmod");
        path
    }

    #[tokio::test]
    async fn functional_deploy_passes_credentials_to_child_and_captures_output() {
        let temp = tempfile::tempdir().expect("tempdir");
        let stub = write_stub(
            temp.path(),
            "wrangler-ok.sh",
            "#!/bin/sh\necho \"Deployment alias URL: https://feature.$CLOUDFLARE_ACCOUNT_ID.test\"\n",
        );
        let runner = WranglerRunner::with_program(stub.to_string_lossy().to_string());
        let output = runner
            .deploy(temp.path(), "demo", "feature", &credentials())
            .await
            .expect("deploy");
        assert!(output.contains("https://feature.acct.test"));
    }

    #[tokio::test]
    async fn unit_deploy_non_zero_exit_is_an_error_with_stderr_tail() {
        let temp = tempfile::tempdir().expect("tempdir");
        let stub = write_stub(
            temp.path(),
            "wrangler-fail.sh",
            "#!/bin/sh\necho \"auth failure\" >&2\nexit 3\n",
        );
        let runner = WranglerRunner::with_program(stub.to_string_lossy().to_string());
        let error = runner
            .deploy(temp.path(), "demo", "feature", &credentials())
            .await
            .expect_err("must fail");
        let message = error.to_string();
        assert!(message.contains("exited with 3"));
        assert!(message.contains("auth failure"));
    }

    #[tokio::test]
    async fn unit_deploy_missing_program_reports_spawn_failure() {
        let runner = WranglerRunner::with_program("/nonexistent/wrangler-binary");
        let error = runner
            .deploy(Path::new("dist"), "demo", "main", &credentials())
            .await
            .expect_err("must fail");
        assert!(error.to_string().contains("failed to spawn deploy tool"));
    }
}
