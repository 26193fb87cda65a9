//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for shopvault using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// shopvault - POS snapshot export and import
#[derive(Parser, Debug)]
#[command(name = "shopvault")]
#[command(version, about, long_about = None)]
#[command(author = "Shopvault Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "shopvault.toml", env = "SHOPVAULT_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SHOPVAULT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export shop data to a checksummed snapshot file
    Export(commands::export::ExportArgs),

    /// Import a snapshot file into the shop data store
    Import(commands::import::ImportArgs),

    /// Check a snapshot file without importing it
    Verify(commands::verify::VerifyArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_export() {
        let cli = Cli::parse_from(["shopvault", "export"]);
        assert_eq!(cli.config, "shopvault.toml");
        assert!(matches!(cli.command, Commands::Export(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["shopvault", "--config", "custom.toml", "export"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["shopvault", "--log-level", "debug", "verify", "a.json"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_import() {
        let cli = Cli::parse_from([
            "shopvault",
            "import",
            "exports/products.json",
            "--data-type",
            "products",
            "--dry-run",
        ]);
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(args.path.to_str(), Some("exports/products.json"));
                assert_eq!(args.data_type.as_deref(), Some("products"));
                assert!(args.dry_run);
            }
            other => panic!("expected import, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["shopvault", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["shopvault", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }

    #[test]
    fn test_cli_import_requires_path() {
        assert!(Cli::try_parse_from(["shopvault", "import"]).is_err());
    }
}
