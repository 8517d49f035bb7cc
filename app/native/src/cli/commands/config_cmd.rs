//! Config CLI commands.
//!
//! Commands for managing the Strata configuration file.

use std::path::PathBuf;

use clap::Subcommand;
use colored::Colorize;

use crate::cli::output;
use crate::config::template::{create_config_file, generate_config_template};
use crate::config::{StrataConfig, config_paths, default_config_path, get_custom_config_path};
use crate::error::StrataError;

/// Config management commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum ConfigCommands {
    /// Initialize a new configuration file with all options documented.
    ///
    /// Creates a new configuration file at the default location. Every
    /// option except `imagePath` is commented out and shows its default.
    #[command(
        name = "init",
        after_long_help = r#"Examples:
  strata config init              # Create config at default location
  strata config init --force      # Overwrite existing config
  strata config init --path ~/my-config.jsonc  # Create at custom path
  strata config init --stdout     # Print template to stdout"#
    )]
    Init {
        /// Overwrite existing configuration file if it exists.
        #[arg(long, short)]
        force: bool,

        /// Custom path for the configuration file.
        /// If not specified, uses ~/.config/strata/config.jsonc
        #[arg(long, short, value_name = "PATH")]
        path: Option<PathBuf>,

        /// Print the configuration template to stdout instead of writing to a file.
        #[arg(long)]
        stdout: bool,
    },

    /// Show the path to the configuration file.
    ///
    /// Displays the paths where Strata looks for configuration files,
    /// and indicates which one is currently in use (if any).
    Path,

    /// Output the configuration JSON Schema.
    ///
    /// Can be redirected to a file for use with editors that support JSON
    /// Schema validation.
    Schema,
}

/// Execute config subcommands.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cmd: &ConfigCommands) -> Result<(), StrataError> {
    match cmd {
        ConfigCommands::Init { force, path, stdout } => {
            if *stdout {
                println!("{}", generate_config_template());
                Ok(())
            } else {
                init_config(*force, path.clone())
            }
        }
        ConfigCommands::Path => {
            show_config_path();
            Ok(())
        }
        ConfigCommands::Schema => {
            output::print_highlighted_json(&config_schema()?);
            Ok(())
        }
    }
}

/// JSON Schema describing the configuration file.
///
/// # Errors
///
/// Returns an error if the schema cannot be serialized.
pub fn config_schema() -> Result<serde_json::Value, StrataError> {
    Ok(serde_json::to_value(schemars::schema_for!(StrataConfig))?)
}

/// Initialize a new configuration file.
fn init_config(force: bool, custom_path: Option<PathBuf>) -> Result<(), StrataError> {
    let config_path = custom_path
        .or_else(default_config_path)
        .unwrap_or_else(|| PathBuf::from("config.jsonc"));

    if config_path.exists() && !force {
        return Err(StrataError::ConfigError(format!(
            "Configuration file already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        )));
    }

    create_config_file(&config_path).map_err(|e| {
        StrataError::ConfigError(format!("Failed to create config file {}: {e}", config_path.display()))
    })?;

    println!("Configuration file created at: {}", config_path.display());
    println!("\nSet \"imagePath\" to the photo you want to use, then run 'strata run'.");

    Ok(())
}

/// Show the configuration file path.
fn show_config_path() {
    if let Some(path) = get_custom_config_path() {
        println!("Using configuration file from --config:\n\n  {}", path.display());
        return;
    }

    println!("Configuration file search paths (in priority order):\n");

    let mut found_config = false;
    for (i, path) in config_paths().iter().enumerate() {
        let exists = path.exists();
        let marker = if exists && !found_config {
            found_config = true;
            " (active)".green().to_string()
        } else if exists {
            " (exists)".dimmed().to_string()
        } else {
            String::new()
        };

        println!("  {}. {}{marker}", i + 1, path.display());
    }

    if !found_config {
        println!("\nNo configuration file found.");
        println!("Run 'strata config init' to create one.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lists_config_keys() {
        let schema = config_schema().unwrap();
        let properties = schema["properties"].as_object().unwrap();
        for key in ["imagePath", "numLayers", "clockLayer", "updateInterval", "fontColor", "depthCommand"] {
            assert!(properties.contains_key(key), "schema is missing {key}");
        }
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.jsonc");
        std::fs::write(&path, "{}").unwrap();

        let result = init_config(false, Some(path.clone()));
        assert!(matches!(result, Err(StrataError::ConfigError(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_init_force_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.jsonc");
        std::fs::write(&path, "{}").unwrap();

        init_config(true, Some(path.clone())).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), generate_config_template());
    }
}
