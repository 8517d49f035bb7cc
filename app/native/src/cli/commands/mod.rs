//! CLI command definitions using Clap.
//!
//! Commands are organized into domain-specific submodules:
//!
//! - `cache` - Cache management commands
//! - `config_cmd` - Configuration file commands
//! - `wallpaper` - Running, rendering and inspecting the layered wallpaper

use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Generator, Shell, generate};

use crate::config;
use crate::constants::APP_ID;
use crate::error::StrataError;

pub mod cache;
pub mod config_cmd;
pub mod wallpaper;

pub use cache::CacheCommands;
pub use config_cmd::ConfigCommands;
pub use wallpaper::{ExportArgs, LayersArgs, RenderArgs};

/// Application version from Cargo.toml.
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Strata - depth-layered clock wallpapers.
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author, version = APP_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a custom configuration file.
    ///
    /// Overrides the default configuration file search paths.
    /// Supports JSONC format (JSON with comments).
    #[arg(long, short, global = true, value_name = "PATH")]
    pub config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum Commands {
    /// Keep the wallpaper's clock up to date.
    ///
    /// Builds the layers (or loads them from cache), sets the first frame and
    /// then updates every `updateInterval` seconds until interrupted.
    /// Changes to the configuration file are applied while running.
    Run,

    /// Render a single frame.
    ///
    /// Writes one frame to the output path and, unless disabled in the
    /// configuration, sets it as the wallpaper.
    Render(RenderArgs),

    /// Show the depth layers generated for the configured image.
    Layers(LayersArgs),

    /// Write every layer (and the depth map) as PNG files.
    Export(ExportArgs),

    /// Cache management commands.
    ///
    /// Manage the application's cache directory.
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Configuration file management commands.
    ///
    /// Initialize, locate and describe the configuration file.
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions.
    ///
    /// Outputs shell completion script to stdout for the specified shell.
    /// Can be used with eval or redirected to a file.
    ///
    /// Usage:
    ///   eval "$(strata completions --shell zsh)"
    ///   strata completions --shell bash > ~/.local/share/bash-completion/completions/strata
    ///   strata completions --shell fish > ~/.config/fish/completions/strata.fish
    #[command(verbatim_doc_comment)]
    Completions {
        /// The shell to generate completions for.
        #[arg(long, short, value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Returns the custom config path if specified via --config flag.
    #[must_use]
    pub fn config_path(&self) -> Option<PathBuf> { self.config.as_ref().map(PathBuf::from) }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command execution fails.
    pub fn execute(&self) -> Result<(), StrataError> {
        if let Some(path) = self.config.as_deref() {
            let path_buf = config::types::resolve_cli_path(path);
            if !path_buf.exists() {
                return Err(StrataError::ConfigError(format!("Configuration file not found: {path}")));
            }
            config::set_custom_config_path(path_buf);
        }

        match &self.command {
            Commands::Run => wallpaper::execute_run(),
            Commands::Render(args) => wallpaper::execute_render(args),
            Commands::Layers(args) => wallpaper::execute_layers(args),
            Commands::Export(args) => wallpaper::execute_export(args),
            Commands::Cache(cmd) => cache::execute(cmd),
            Commands::Config(cmd) => config_cmd::execute(cmd),
            Commands::Completions { shell } => {
                Self::print_completions(*shell);
                Ok(())
            }
        }
    }

    /// Print shell completions to stdout.
    fn print_completions<G: Generator>(generator: G) {
        let mut cmd = Self::command();
        generate(generator, &mut cmd, APP_ID, &mut io::stdout());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // CLI parsing tests
    // ========================================================================

    #[test]
    fn test_cli_definition_is_consistent() { Cli::command().debug_assert(); }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from(["strata", "run"]).unwrap();
        assert!(matches!(cli.command, Commands::Run));
    }

    #[test]
    fn test_cli_parses_render_defaults() {
        let cli = Cli::try_parse_from(["strata", "render"]).unwrap();
        match cli.command {
            Commands::Render(args) => {
                assert!(args.threshold.is_none());
                assert!(args.cutout.is_none());
                assert!(args.output.is_none());
            }
            _ => panic!("Expected Render command"),
        }
    }

    #[test]
    fn test_cli_parses_render_threshold() {
        let cli = Cli::try_parse_from(["strata", "render", "--threshold", "0.4", "-o", "/tmp/frame.png"]).unwrap();
        match cli.command {
            Commands::Render(args) => {
                assert_eq!(args.threshold, Some(0.4));
                assert_eq!(args.output, Some("/tmp/frame.png".to_string()));
            }
            _ => panic!("Expected Render command"),
        }
    }

    #[test]
    fn test_cli_rejects_threshold_with_cutout() {
        let result = Cli::try_parse_from(["strata", "render", "--threshold", "0.5", "--cutout", "mask.png"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses_layers_json() {
        let cli = Cli::try_parse_from(["strata", "layers", "--json"]).unwrap();
        match cli.command {
            Commands::Layers(args) => assert!(args.json),
            _ => panic!("Expected Layers command"),
        }
    }

    #[test]
    fn test_cli_parses_export() {
        let cli = Cli::try_parse_from(["strata", "export", "./out"]).unwrap();
        match cli.command {
            Commands::Export(args) => assert_eq!(args.dir, "./out"),
            _ => panic!("Expected Export command"),
        }
    }

    #[test]
    fn test_cli_export_requires_dir() {
        assert!(Cli::try_parse_from(["strata", "export"]).is_err());
    }

    #[test]
    fn test_cli_parses_cache_clear() {
        let cli = Cli::try_parse_from(["strata", "cache", "clear"]).unwrap();
        assert!(matches!(cli.command, Commands::Cache(CacheCommands::Clear)));
    }

    #[test]
    fn test_cli_parses_cache_path() {
        let cli = Cli::try_parse_from(["strata", "cache", "path"]).unwrap();
        assert!(matches!(cli.command, Commands::Cache(CacheCommands::Path)));
    }

    #[test]
    fn test_cli_parses_config_schema() {
        let cli = Cli::try_parse_from(["strata", "config", "schema"]).unwrap();
        assert!(matches!(cli.command, Commands::Config(ConfigCommands::Schema)));
    }

    #[test]
    fn test_cli_parses_completions() {
        for (name, shell) in [("bash", Shell::Bash), ("zsh", Shell::Zsh), ("fish", Shell::Fish)] {
            let cli = Cli::try_parse_from(["strata", "completions", "--shell", name]).unwrap();
            match cli.command {
                Commands::Completions { shell: parsed } => assert_eq!(parsed, shell),
                _ => panic!("Expected Completions command"),
            }
        }
    }

    // ========================================================================
    // APP_VERSION constant test
    // ========================================================================

    #[test]
    fn test_app_version_format() {
        assert!(APP_VERSION.split('.').count() >= 2, "Version should have at least major.minor");
    }

    // ========================================================================
    // --config flag tests
    // ========================================================================

    #[test]
    fn test_cli_parses_config_flag() {
        let cli = Cli::try_parse_from(["strata", "--config", "/path/to/config.json", "run"]).unwrap();
        assert_eq!(cli.config, Some("/path/to/config.json".to_string()));
        assert!(matches!(cli.command, Commands::Run));
    }

    #[test]
    fn test_cli_parses_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["strata", "layers", "-c", "/path/to/config.json"]).unwrap();
        assert_eq!(cli.config_path(), Some(PathBuf::from("/path/to/config.json")));
    }

    #[test]
    fn test_cli_config_path_returns_none_when_not_specified() {
        let cli = Cli::try_parse_from(["strata", "run"]).unwrap();
        assert!(cli.config_path().is_none());
    }

    #[test]
    fn test_execute_rejects_missing_config_file() {
        let cli = Cli::try_parse_from(["strata", "--config", "/nonexistent/strata.jsonc", "layers"]).unwrap();
        assert!(matches!(cli.execute(), Err(StrataError::ConfigError(_))));
    }
}
