//! Configuration management for the upgrade agent
//!
//! A single config file carries both the upgrade snapshot (top-level keys)
//! and the agent's own settings (the optional `agent` table). Files ending in
//! `.yaml`/`.yml` are parsed as YAML, anything else as TOML.

mod agent;
pub mod serde_utils;
mod upgrade;
mod watcher;

pub use agent::{AgentSettings, WorkflowTimings, DEFAULT_STATE_FILE};
pub use upgrade::{FirmwareOptions, UpgradeConfig};
pub use watcher::{ConfigManager, ConfigWatcher};

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use serde_utils::lenient_bool;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/upgrade-agent/config.yaml";

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// On-disk syntax of a config file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Toml,
        }
    }
}

/// Parsed contents of a config file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    /// Upgrade snapshot delivered to the orchestrator
    pub upgrade: UpgradeConfig,
    /// Agent process settings
    pub agent: AgentSettings,
}

/// Wire form of the config file, accepting the older deployment key names
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawConfigFile {
    #[serde(alias = "grpcTarget")]
    control_target: String,
    firmware_source: String,
    firmware_options: Option<FirmwareOptions>,
    #[serde(deserialize_with = "lenient_bool::deserialize_opt")]
    update_mlnx_cpld_fw: Option<bool>,
    #[serde(alias = "targetVersion")]
    desired_version: String,
    #[serde(
        alias = "ignoreUnimplementedRPC",
        deserialize_with = "lenient_bool::deserialize"
    )]
    ignore_unimplemented: bool,
    agent: AgentSettings,
}

impl From<RawConfigFile> for ConfigFile {
    fn from(raw: RawConfigFile) -> Self {
        let mut firmware_options = raw.firmware_options.unwrap_or_default();
        // A top-level flag wins over the nested table
        if let Some(flag) = raw.update_mlnx_cpld_fw {
            firmware_options.update_mlnx_cpld_fw = flag;
        }

        Self {
            upgrade: UpgradeConfig {
                control_target: raw.control_target,
                firmware_source: raw.firmware_source,
                firmware_options,
                desired_version: raw.desired_version,
                ignore_unimplemented: raw.ignore_unimplemented,
            },
            agent: raw.agent,
        }
    }
}

/// Parse config file contents in the given format
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<ConfigFile, ConfigError> {
    let raw: RawConfigFile = match format {
        ConfigFormat::Toml => toml::from_str(content)?,
        // An empty YAML document is `null`, which serde_yaml rejects for a struct
        ConfigFormat::Yaml if content.trim().is_empty() => RawConfigFile::default(),
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
    };
    Ok(raw.into())
}

/// Load configuration from a file
pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    if content.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("Config file {:?} is empty", path)));
    }

    parse_config(&content, ConfigFormat::from_path(path))
}
