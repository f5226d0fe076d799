use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};

/// Writes text using a temp file + rename so a crashed run never leaves a
/// partially written sidecar inside the artifact directory.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("destination path cannot be empty");
    }
    if path.is_dir() {
        bail!("destination path '{}' is a directory", path.display());
    }

    let parent_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let temp_name = format!(
        ".{}.tmp-{}-{}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("sidecar"),
        std::process::id(),
        stamp
    );
    let temp_path = parent_dir.join(temp_name);
    std::fs::write(&temp_path, content)
        .with_context(|| format!("failed to write temporary file {}", temp_path.display()))?;
    std::fs::rename(&temp_path, path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_write_text_atomic_writes_content_and_removes_temp() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("_headers.json");
        write_text_atomic(&path, "{\"/*\":{}}").expect("write");
        assert_eq!(
            std::fs::read_to_string(&path).expect("read"),
            "{\"/*\":{}}"
        );
        let leftovers = std::fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().contains("tmp-"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn unit_write_text_atomic_rejects_directory_target() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(write_text_atomic(temp.path(), "x").is_err());
    }
}
