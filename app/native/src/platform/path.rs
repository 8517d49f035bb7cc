//! Path expansion for user-supplied paths.
//!
//! Paths in the config file and on the command line may start with `~`;
//! relative paths in the config file are relative to the file itself.

use std::path::{Path, PathBuf};

/// Expands a leading `~` to the home directory. Other paths are returned
/// unchanged; blank input yields an empty path.
#[must_use]
pub fn expand(path: &str) -> PathBuf {
    let path = path.trim();
    if path.is_empty() {
        return PathBuf::new();
    }
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Expands `~` and joins relative results onto `base_dir`.
#[must_use]
pub fn expand_and_resolve(path: &str, base_dir: &Path) -> PathBuf {
    let expanded = expand(path);
    if expanded.as_os_str().is_empty() || expanded.is_absolute() {
        return expanded;
    }
    base_dir.join(expanded)
}

/// Like [`expand_and_resolve`], for optional config values. Blank values
/// are treated as unset.
#[must_use]
pub fn resolve_optional(path: Option<&str>, base_dir: &Path) -> Option<PathBuf> {
    path.map(|p| expand_and_resolve(p, base_dir)).filter(|p| !p.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_blank() {
        assert_eq!(expand(""), PathBuf::new());
        assert_eq!(expand("   "), PathBuf::new());
    }

    #[test]
    fn test_expand_keeps_absolute_and_relative() {
        assert_eq!(expand("/photos/beach.jpg"), PathBuf::from("/photos/beach.jpg"));
        assert_eq!(expand("photos/beach.jpg"), PathBuf::from("photos/beach.jpg"));
    }

    #[test]
    fn test_expand_tilde() {
        let result = expand("~/Pictures/beach.jpg");
        assert!(!result.to_string_lossy().starts_with('~'));
        assert!(result.ends_with("Pictures/beach.jpg"));
    }

    #[test]
    fn test_resolve_relative_against_base() {
        let base = Path::new("/home/user/.config/strata");
        assert_eq!(
            expand_and_resolve("beach.jpg", base),
            PathBuf::from("/home/user/.config/strata/beach.jpg")
        );
        assert_eq!(
            expand_and_resolve("  fonts/clock.ttf ", base),
            PathBuf::from("/home/user/.config/strata/fonts/clock.ttf")
        );
    }

    #[test]
    fn test_resolve_tilde_ignores_base() {
        let result = expand_and_resolve("~/beach.jpg", Path::new("/base"));
        assert!(!result.to_string_lossy().contains("/base"));
        assert!(result.ends_with("beach.jpg"));
    }

    #[test]
    fn test_resolve_optional() {
        let base = Path::new("/base");
        assert_eq!(resolve_optional(None, base), None);
        assert_eq!(resolve_optional(Some(""), base), None);
        assert_eq!(resolve_optional(Some("a.ttf"), base), Some(PathBuf::from("/base/a.ttf")));
    }
}
