//! Transient report files written under the report output directory.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ApiError, Result};

/// Resolve `file_name` against `base`. The result must stay inside `base`
/// once `.` and `..` segments are applied.
pub fn resolve_report_path(base: &Path, file_name: &str) -> Result<PathBuf> {
    let base = std::path::absolute(base)?;
    let candidate = Path::new(file_name);
    if candidate.is_absolute() {
        return Err(ApiError::PathSecurity(format!("Invalid file name: {}", file_name)));
    }

    let mut resolved = base.clone();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(ApiError::PathSecurity(format!(
                        "Invalid file name: {}",
                        file_name
                    )));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ApiError::PathSecurity(format!(
                    "Invalid file name: {}",
                    file_name
                )))
            }
        }
    }

    if resolved == base || !resolved.starts_with(&base) {
        return Err(ApiError::PathSecurity(format!("Invalid file name: {}", file_name)));
    }
    Ok(resolved)
}

/// Read a report file written under the output directory and remove it.
pub async fn take_report_file(path: &Path) -> Result<Vec<u8>> {
    let read = tokio::fs::read(path).await;
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Could not remove transient report file");
    }
    let bytes = read?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read transient report file");
    Ok(bytes)
}
