//! Locating external executables such as depth models.

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable with extra search directories, separated like `PATH`.
pub const EXTRA_PATHS_ENV: &str = "STRATA_EXTRA_PATHS";

/// Resolves `binary` to an executable path.
///
/// Absolute paths and paths with a directory component are checked as-is.
/// Bare names are searched in `STRATA_EXTRA_PATHS`, then `PATH`, then a few
/// common user install locations.
///
/// # Errors
///
/// Returns a description of the failure when nothing executable is found.
pub fn resolve_binary(binary: &str) -> Result<PathBuf, String> {
    if binary.is_empty() {
        return Err("Binary name cannot be empty".to_string());
    }

    let candidate = Path::new(binary);
    if candidate.is_absolute() || candidate.components().count() > 1 {
        return if is_executable(candidate) {
            Ok(candidate.to_path_buf())
        } else {
            Err(format!("Binary at {} is not executable", candidate.display()))
        };
    }

    search_paths()
        .into_iter()
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| executable_names(binary).into_iter().map(move |name| dir.join(name)))
        .find(|path| is_executable(path))
        .ok_or_else(|| format!("Unable to locate executable '{binary}' in known search paths"))
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(extra) = env::var_os(EXTRA_PATHS_ENV) {
        paths.extend(env::split_paths(&extra));
    }
    if let Some(path_var) = env::var_os("PATH") {
        paths.extend(env::split_paths(&path_var));
    }

    paths.extend([PathBuf::from("/usr/local/bin"), PathBuf::from("/opt/homebrew/bin")]);
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".local/bin"));
        paths.push(home.join(".cargo/bin"));
    }

    paths
}

fn executable_names(binary: &str) -> Vec<String> {
    if cfg!(windows) && Path::new(binary).extension().is_none() {
        vec![format!("{binary}.exe"), binary.to_string()]
    } else {
        vec![binary.to_string()]
    }
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_name_is_rejected() {
        assert!(resolve_binary("").is_err());
    }

    #[test]
    fn test_missing_absolute_path() {
        let err = resolve_binary("/nonexistent/depth-model").unwrap_err();
        assert!(err.contains("/nonexistent/depth-model"));
    }

    #[test]
    fn test_unknown_binary() {
        let err = resolve_binary("strata-definitely-not-installed").unwrap_err();
        assert!(err.contains("strata-definitely-not-installed"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolves_from_path() {
        let resolved = resolve_binary("sh").unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("sh"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_is_rejected() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        assert!(resolve_binary(&temp.path().display().to_string()).is_err());
    }
}
