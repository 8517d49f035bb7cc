//! Cache CLI commands.

use clap::Subcommand;
use colored::Colorize;

use crate::cache;
use crate::error::StrataError;

/// Cache subcommands for managing the application's cache.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum CacheCommands {
    /// Clear the application's cache directory.
    ///
    /// Removes cached layers and the last rendered frame. Layers are
    /// regenerated on the next run.
    #[command(after_long_help = r#"Examples:
  strata cache clear   # Clear all cached data"#)]
    Clear,

    /// Show the cache directory location.
    #[command(after_long_help = r#"Examples:
  strata cache path    # Print the cache directory path"#)]
    Path,
}

/// Execute cache subcommands.
///
/// # Errors
///
/// Returns an error if the cache cannot be cleared.
pub fn execute(cmd: &CacheCommands) -> Result<(), StrataError> {
    match cmd {
        CacheCommands::Clear => {
            let cache_dir = cache::get_cache_dir();
            if !cache_dir.exists() {
                println!("Cache directory does not exist. Nothing to clear.");
                return Ok(());
            }

            let bytes_freed = cache::clear_cache()
                .map_err(|err| StrataError::CacheError(format!("Failed to clear cache: {err}")))?;
            println!("{} Freed {}.", "Cache cleared.".green(), cache::format_bytes(bytes_freed));
        }
        CacheCommands::Path => {
            println!("{}", cache::get_cache_dir().display());
        }
    }
    Ok(())
}
