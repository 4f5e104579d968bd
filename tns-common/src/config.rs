//! Bootstrap configuration loaded from TOML
//!
//! The TOML file holds registry bot credentials, relay settings, polling
//! parameters and logging. Values here are the lowest-priority tier: the
//! submission crate overlays environment variables on top of them.
//!
//! # Config file location priority
//!
//! 1. `TNS_CONFIG` environment variable
//! 2. User config dir (`~/.config/tns-submit/config.toml` on Linux)
//! 3. `/etc/tns-submit/config.toml` (Linux only)

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "TNS_CONFIG";

const CONFIG_DIR_NAME: &str = "tns-submit";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Root of the TOML configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Direct registry access (bot credentials, mapping tables)
    #[serde(default)]
    pub registry: Option<RegistrySection>,

    /// Relay service settings
    #[serde(default)]
    pub relay: Option<RelaySection>,

    /// Reply polling parameters
    #[serde(default)]
    pub polling: PollingSection,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// `[registry]` section
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySection {
    pub bot_id: Option<u64>,
    pub bot_name: Option<String>,
    pub api_key: Option<String>,
    /// Base API URL, e.g. `https://sandbox.wis-tns.org/api`
    pub base_url: Option<String>,
    /// Reporting group labels this installation may report as
    #[serde(default)]
    pub group_names: Vec<String>,
    /// Reporter/classifier text used when a request leaves it blank
    #[serde(default)]
    pub default_authors: Option<String>,
    /// Local filter name -> registry filter label
    #[serde(default)]
    pub filter_mapping: HashMap<String, String>,
    /// Local instrument or telescope name -> registry instrument label
    #[serde(default)]
    pub instrument_mapping: HashMap<String, String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            bot_id: None,
            bot_name: None,
            api_key: None,
            base_url: None,
            group_names: Vec::new(),
            default_authors: None,
            filter_mapping: HashMap::new(),
            instrument_mapping: HashMap::new(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// `[relay]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelaySection {
    /// Route submissions through the relay instead of the registry
    #[serde(default)]
    pub enable: bool,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default)]
    pub default_authors: Option<String>,
    #[serde(default)]
    pub filter_mapping: HashMap<String, String>,
    #[serde(default)]
    pub instrument_mapping: HashMap<String, String>,
}

/// `[polling]` section
#[derive(Debug, Clone, Deserialize)]
pub struct PollingSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    10
}

fn default_interval_ms() -> u64 {
    1000
}

impl TomlConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Read and parse a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded TOML configuration");
        Self::from_toml_str(&content)
    }

    /// Load the config file found by [`locate_config_file`], or defaults when none exists
    pub fn load_or_default(cli_path: Option<&Path>) -> Result<Self> {
        match locate_config_file(cli_path) {
            Some(path) => Self::load(&path),
            None => {
                debug!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Find the configuration file
///
/// An explicit path (command line) wins, then `TNS_CONFIG`, then the
/// platform config directories. Explicit paths are returned even when the
/// file does not exist so the caller reports a read error instead of
/// silently falling back to defaults.
pub fn locate_config_file(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}
