//! Process environment helpers for locating backend binaries.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Append `dir` to the process `PATH` so backend helper binaries can be found.
///
/// Already-present entries are left alone. Call this before any backend thread
/// is started.
pub fn add_binary_path(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    let current = env::var_os("PATH").unwrap_or_default();
    let Some(joined) = appended_path(&current, dir)? else {
        tracing::debug!(dir = %dir.display(), "binary path already present");
        return Ok(());
    };
    // SAFETY: documented as a startup-only call, before the backend spawns threads
    // that could read the environment concurrently.
    unsafe { env::set_var("PATH", &joined) };
    tracing::info!(dir = %dir.display(), "added binary path");
    Ok(())
}

/// `current` with `dir` appended, or `None` when `dir` is already listed.
fn appended_path(current: &OsString, dir: &Path) -> Result<Option<OsString>> {
    let mut entries: Vec<PathBuf> = env::split_paths(current).collect();
    if entries.iter().any(|p| p == dir) {
        return Ok(None);
    }
    entries.push(dir.to_path_buf());
    let joined = env::join_paths(entries)
        .with_context(|| format!("invalid PATH entry {:?}", dir))?;
    Ok(Some(joined))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_new_directory() {
        let current = env::join_paths(["/usr/bin", "/bin"]).unwrap();
        let joined = appended_path(&current, Path::new("/opt/media/bin"))
            .unwrap()
            .unwrap();
        let entries: Vec<PathBuf> = env::split_paths(&joined).collect();
        assert_eq!(entries.last().unwrap(), Path::new("/opt/media/bin"));
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn existing_directory_is_not_duplicated() {
        let current = env::join_paths(["/usr/bin", "/opt/media/bin"]).unwrap();
        assert!(
            appended_path(&current, Path::new("/opt/media/bin"))
                .unwrap()
                .is_none()
        );
    }

    #[cfg(unix)]
    #[test]
    fn separator_in_directory_is_rejected() {
        let current = OsString::from("/usr/bin");
        assert!(appended_path(&current, Path::new("/opt/a:b")).is_err());
    }
}
