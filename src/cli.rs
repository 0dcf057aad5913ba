//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

/// iplocator - resolve IP addresses to countries from RIR delegation data
#[derive(Parser)]
#[command(name = "iplocator")]
#[command(version)]
#[command(about = "Resolve IP addresses to countries from RIR delegation data", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP lookup server (default)
    Serve,

    /// Fetch all configured feeds once and replace the stored ranges
    Refresh,

    /// Resolve a single IP address against the configured store
    Lookup {
        /// IPv4 or IPv6 address
        ip: String,
    },

    /// Parse a local delegation file and print statistics
    Parse {
        /// Path to a delegated-*-extended file
        file_path: String,

        /// Print every parsed range
        #[arg(long)]
        verbose: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Force overwrite without confirmation
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration (file + environment)
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["iplocator"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["iplocator", "lookup", "8.8.8.8", "-c", "x.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("x.toml"));
        match cli.command {
            Some(Commands::Lookup { ip }) => assert_eq!(ip, "8.8.8.8"),
            _ => panic!("expected lookup"),
        }
    }

    #[test]
    fn test_config_generate_args() {
        let cli =
            Cli::try_parse_from(["iplocator", "config", "generate", "out.toml", "--force"]).unwrap();
        match cli.command {
            Some(Commands::Config {
                action: ConfigCommands::Generate { output_path, force },
            }) => {
                assert_eq!(output_path.as_deref(), Some("out.toml"));
                assert!(force);
            }
            _ => panic!("expected config generate"),
        }
    }

    #[test]
    fn test_lookup_requires_ip() {
        assert!(Cli::try_parse_from(["iplocator", "lookup"]).is_err());
    }
}
