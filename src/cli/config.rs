//! Operator configuration file handling
//!
//! The operator file controls logging and the organization settings new
//! organizations start with when a script does not override them. Once an
//! organization exists its settings change only through proposals.

use serde::{Deserialize, Serialize};
use sigorg::{OrganizationSettings, RegrantBehavior};
use std::fs;
use std::path::{Path, PathBuf};

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// sigorg operator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SigorgConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub governance: GovernanceConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

/// Settings applied to organizations created by `simulate`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub regrant: RegrantBehavior,

    pub default_proposal_ttl_secs: Option<u64>,
}

impl GovernanceConfig {
    pub fn settings(&self) -> OrganizationSettings {
        OrganizationSettings {
            regrant: self.regrant,
            default_proposal_ttl_secs: self.default_proposal_ttl_secs,
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl SigorgConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: SigorgConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// Load `path` if given, else the default file if it exists, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = default_config_path();
                if default.exists() {
                    Self::load(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save configuration to a TOML file
    #[allow(dead_code)]
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml() -> String {
        r#"# sigorg Operator Configuration
#
# Organization settings below only seed organizations created by
# `sigorg simulate`. After creation, an organization's settings and approval
# policy change ONLY through executed proposals.

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides)
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/sigorg/sigorg.log"

[governance]
# Granting membership to an existing member:
#   "idempotent" - no-op, balance stays at 1
#   "reject"     - the instruction fails and its proposal is rejected
regrant = "idempotent"

# Expiry for proposals created without an explicit TTL (seconds).
# Leave commented for proposals that never expire.
# default_proposal_ttl_secs = 172800
"#
        .to_string()
    }

    /// Write the commented default file. Refuses to overwrite unless `force`.
    pub fn create_default(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
        if path.exists() && !force {
            return Err(format!(
                "Config file '{}' already exists (use --force to overwrite)",
                path.display()
            )
            .into());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, Self::generate_default_toml())
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }
}

/// Default config file path: `<config dir>/sigorg/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sigorg")
        .join("config.toml")
}

/// `sigorg config init`
pub fn init(output: Option<String>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = output.map(PathBuf::from).unwrap_or_else(default_config_path);
    SigorgConfig::create_default(&path, force)?;
    println!("Wrote {}", path.display());
    Ok(())
}
