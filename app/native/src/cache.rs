//! Cache directory utilities.
//!
//! Everything Strata caches (generated layers, the current frame) lives
//! under `<user cache dir>/strata/`, falling back to the system temp
//! directory when no cache directory is known.

use std::path::{Path, PathBuf};

use crate::constants::APP_ID;

/// Returns the root cache directory for the application.
#[must_use]
pub fn get_cache_dir() -> PathBuf {
    dirs::cache_dir().map_or_else(|| std::env::temp_dir().join(APP_ID), |cache| cache.join(APP_ID))
}

/// Returns a cache subdirectory for the given component (e.g. `layers`).
#[must_use]
pub fn get_cache_subdir(subdir: &str) -> PathBuf { get_cache_dir().join(subdir) }

/// Removes the whole cache directory.
///
/// Returns the approximate number of bytes freed; a missing directory
/// frees nothing.
///
/// # Errors
///
/// Returns an error if the directory cannot be measured or removed.
pub fn clear_cache() -> std::io::Result<u64> {
    let cache_dir = get_cache_dir();
    if !cache_dir.exists() {
        return Ok(0);
    }

    let bytes_freed = calculate_dir_size(&cache_dir)?;
    std::fs::remove_dir_all(&cache_dir)?;
    Ok(bytes_freed)
}

/// Calculates the total size of a directory in bytes.
///
/// # Errors
///
/// Returns an error if a directory cannot be read.
pub fn calculate_dir_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0u64;

    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                total += calculate_dir_size(&path)?;
            } else {
                total += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }
    }

    Ok(total)
}

/// Formats a byte count as a human-readable string like "1.50 MB".
#[must_use]
#[allow(clippy::cast_precision_loss)] // Precision loss is acceptable for human-readable output
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_get_cache_dir_ends_with_app_id() {
        assert!(get_cache_dir().ends_with(APP_ID));
    }

    #[test]
    fn test_get_cache_subdir_contains_component() {
        let path = get_cache_subdir("layers");
        assert!(path.ends_with("layers"));
        assert!(path.to_string_lossy().contains(APP_ID));
    }

    #[test]
    fn test_calculate_dir_size_is_recursive() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.png"), [0u8; 100]).unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();
        std::fs::write(temp.path().join("nested").join("b.png"), [0u8; 28]).unwrap();

        assert_eq!(calculate_dir_size(temp.path()).unwrap(), 128);
    }

    #[test]
    fn test_calculate_dir_size_missing_dir() {
        assert_eq!(calculate_dir_size(Path::new("/nonexistent/strata")).unwrap(), 0);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 bytes");
        assert_eq!(format_bytes(1023), "1023 bytes");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1024 * 1024 + 512 * 1024), "1.50 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GB");
    }
}
