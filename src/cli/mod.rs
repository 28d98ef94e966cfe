use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod simulate;
pub mod version;

#[derive(Parser)]
#[command(name = "sigorg")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for sigorg organization governance", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the operator config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Replay a governance script against an in-memory store
    Simulate {
        /// Path to the TOML script
        #[arg(long)]
        script: String,

        /// Path to config file (default: <config dir>/sigorg/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Print one JSON object per step instead of text
        #[arg(long)]
        json: bool,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a commented default config file
    Init {
        /// Output path (default: <config dir>/sigorg/config.toml)
        #[arg(long)]
        output: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Config {
            action: ConfigAction::Init { output, force },
        } => config::init(output, force),
        Commands::Simulate {
            script,
            config,
            json,
        } => simulate::execute(script, config, json).await,
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

/// Install the tracing subscriber. `RUST_LOG` overrides the configured level.
pub fn init_logging(logging: &config::LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| format!("Invalid log level '{}': {}", logging.level, e))?;

    let installed = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("Failed to open log file '{}': {}", path.display(), e))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    match installed {
        Ok(()) => Ok(()),
        // A subscriber from an earlier call (or a test harness) keeps logging.
        Err(_) => {
            tracing::debug!("global subscriber already installed, keeping it");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_simulate() {
        let cli = Cli::parse_from(["sigorg", "simulate", "--script", "governance.toml"]);

        match cli.command {
            Commands::Simulate {
                script,
                config,
                json,
            } => {
                assert_eq!(script, "governance.toml");
                assert_eq!(config, None);
                assert!(!json);
            }
            _ => panic!("Expected Simulate command"),
        }
    }

    #[test]
    fn test_cli_parse_simulate_with_all_options() {
        let cli = Cli::parse_from([
            "sigorg",
            "simulate",
            "--script",
            "/tmp/s.toml",
            "--config",
            "/etc/sigorg/config.toml",
            "--json",
        ]);

        match cli.command {
            Commands::Simulate {
                script,
                config,
                json,
            } => {
                assert_eq!(script, "/tmp/s.toml");
                assert_eq!(config, Some("/etc/sigorg/config.toml".to_string()));
                assert!(json);
            }
            _ => panic!("Expected Simulate command"),
        }
    }

    #[test]
    fn test_cli_simulate_requires_script() {
        assert!(Cli::try_parse_from(["sigorg", "simulate"]).is_err());
    }

    #[test]
    fn test_cli_parse_config_init() {
        let cli = Cli::parse_from(["sigorg", "config", "init", "--output", "/tmp/c.toml", "--force"]);

        match cli.command {
            Commands::Config {
                action: ConfigAction::Init { output, force },
            } => {
                assert_eq!(output, Some("/tmp/c.toml".to_string()));
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }

    #[test]
    fn test_cli_parse_version() {
        let cli = Cli::parse_from(["sigorg", "version"]);
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn test_invalid_log_level_is_reported() {
        let logging = config::LoggingConfig {
            level: "sigorg=[".to_string(),
            file: None,
        };
        if std::env::var("RUST_LOG").is_err() {
            assert!(init_logging(&logging).is_err());
        }
    }

    #[test]
    fn test_repeated_logging_init_keeps_first_subscriber() {
        let logging = config::LoggingConfig {
            level: "warn".to_string(),
            file: None,
        };
        assert!(init_logging(&logging).is_ok());
        assert!(init_logging(&logging).is_ok());
    }
}
