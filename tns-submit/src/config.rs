//! Configuration resolution for tns-submit
//!
//! Provides two-tier resolution with ENV → TOML priority on top of
//! [`tns_common::config::TomlConfig`]. Missing credentials are not an error
//! here: they surface as [`SubmissionError::Configuration`] when a
//! submission that needs them is attempted, so the values cache keeps
//! working with only a base URL.

use serde_json::json;
use std::time::Duration;
use tns_common::config::{RegistrySection, RelaySection, TomlConfig};
use tracing::{debug, warn};

use crate::error::{SubmissionError, SubmissionResult};
use crate::services::measurement_mapping::MeasurementMapping;
use crate::services::reply_poller::PollPolicy;

/// Registry sandbox, used when no base URL is configured
pub const SANDBOX_BASE_URL: &str = "https://sandbox.wis-tns.org/api";

pub const ENV_API_KEY: &str = "TNS_API_KEY";
pub const ENV_BOT_ID: &str = "TNS_BOT_ID";
pub const ENV_BOT_NAME: &str = "TNS_BOT_NAME";
pub const ENV_BASE_URL: &str = "TNS_BASE_URL";
pub const ENV_RELAY_ENABLE: &str = "TNS_RELAY_ENABLE";
pub const ENV_RELAY_BASE_URL: &str = "TNS_RELAY_BASE_URL";
pub const ENV_RELAY_API_KEY: &str = "TNS_RELAY_API_KEY";

/// Bot credentials for direct registry calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub bot_id: u64,
    pub bot_name: String,
    pub api_key: String,
}

impl RegistryCredentials {
    /// `User-Agent` value identifying the bot to the registry
    pub fn marker(&self) -> String {
        let marker = json!({
            "tns_id": self.bot_id,
            "type": "bot",
            "name": self.bot_name,
        });
        format!("tns_marker{}", marker)
    }
}

/// Connection and request timeouts for every HTTP client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            request: Duration::from_secs(30),
        }
    }
}

/// Resolved direct-registry settings
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub base_url: String,
    pub bot_id: Option<u64>,
    pub bot_name: Option<String>,
    pub api_key: Option<String>,
    pub group_names: Vec<String>,
    pub default_authors: Option<String>,
    pub mapping: MeasurementMapping,
    pub timeouts: HttpTimeouts,
}

impl RegistrySettings {
    /// Complete bot credentials, or a configuration error naming what is missing
    pub fn credentials(&self) -> SubmissionResult<RegistryCredentials> {
        let mut missing = Vec::new();
        if self.api_key.is_none() {
            missing.push("api_key");
        }
        if self.bot_id.is_none() {
            missing.push("bot_id");
        }
        if self.bot_name.is_none() {
            missing.push("bot_name");
        }

        match (&self.api_key, self.bot_id, &self.bot_name) {
            (Some(api_key), Some(bot_id), Some(bot_name)) => Ok(RegistryCredentials {
                bot_id,
                bot_name: bot_name.clone(),
                api_key: api_key.clone(),
            }),
            _ => Err(SubmissionError::Configuration(format!(
                "Registry credentials incomplete, missing: {}. Configure [registry] in \
                 the TOML config or set {}, {}, {}",
                missing.join(", "),
                ENV_API_KEY,
                ENV_BOT_ID,
                ENV_BOT_NAME
            ))),
        }
    }
}

/// Resolved relay settings
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub enable: bool,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub default_authors: Option<String>,
    pub mapping: MeasurementMapping,
}

/// Everything the submission flow needs, fully resolved
#[derive(Debug, Clone)]
pub struct SubmitSettings {
    pub registry: RegistrySettings,
    pub relay: Option<RelaySettings>,
    pub polling: PollPolicy,
}

impl SubmitSettings {
    /// Resolve settings from environment variables and the TOML config
    pub fn resolve(toml_config: &TomlConfig) -> SubmissionResult<Self> {
        let empty_registry = RegistrySection::default();
        let registry_toml = toml_config.registry.as_ref().unwrap_or(&empty_registry);

        let bot_id = match resolve_string("Registry bot id", ENV_BOT_ID, None) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| {
                SubmissionError::Configuration(format!("{} is not a number: {}", ENV_BOT_ID, e))
            })?),
            None => registry_toml.bot_id,
        };

        let registry = RegistrySettings {
            base_url: resolve_string(
                "Registry base URL",
                ENV_BASE_URL,
                registry_toml.base_url.as_deref(),
            )
            .unwrap_or_else(|| SANDBOX_BASE_URL.to_string()),
            bot_id,
            bot_name: resolve_string(
                "Registry bot name",
                ENV_BOT_NAME,
                registry_toml.bot_name.as_deref(),
            ),
            api_key: resolve_string(
                "Registry API key",
                ENV_API_KEY,
                registry_toml.api_key.as_deref(),
            ),
            group_names: registry_toml.group_names.clone(),
            default_authors: non_blank(registry_toml.default_authors.as_deref()),
            mapping: MeasurementMapping::new(
                registry_toml.filter_mapping.clone(),
                registry_toml.instrument_mapping.clone(),
            ),
            timeouts: HttpTimeouts {
                connect: Duration::from_secs(registry_toml.connect_timeout_secs),
                request: Duration::from_secs(registry_toml.request_timeout_secs),
            },
        };

        let relay = resolve_relay(toml_config.relay.as_ref())?;

        let polling = PollPolicy {
            max_attempts: toml_config.polling.max_attempts.max(1),
            interval: Duration::from_millis(toml_config.polling.interval_ms),
        };

        Ok(Self {
            registry,
            relay,
            polling,
        })
    }

    /// Whether submissions go through the relay instead of the registry
    pub fn submit_through_relay(&self) -> bool {
        self.relay.as_ref().map(|r| r.enable).unwrap_or(false)
    }

    /// Filter/instrument tables for the active submission mode
    pub fn active_mapping(&self) -> &MeasurementMapping {
        match &self.relay {
            Some(relay) if relay.enable => &relay.mapping,
            _ => &self.registry.mapping,
        }
    }

    /// Default author string for the active submission mode
    pub fn default_authors(&self) -> Option<&str> {
        match &self.relay {
            Some(relay) if relay.enable => relay.default_authors.as_deref(),
            _ => self.registry.default_authors.as_deref(),
        }
    }

    /// Check that the active mode has everything it needs to submit
    pub fn validate_for_submission(&self) -> SubmissionResult<()> {
        match &self.relay {
            Some(relay) if relay.enable => {
                if relay.base_url.is_none() || relay.api_key.is_none() {
                    return Err(SubmissionError::Configuration(format!(
                        "Relay submission enabled but base_url or api_key missing. Configure \
                         [relay] in the TOML config or set {} and {}",
                        ENV_RELAY_BASE_URL, ENV_RELAY_API_KEY
                    )));
                }
                Ok(())
            }
            _ => self.registry.credentials().map(|_| ()),
        }
    }
}

fn resolve_relay(relay_toml: Option<&RelaySection>) -> SubmissionResult<Option<RelaySettings>> {
    let env_enable = match std::env::var(ENV_RELAY_ENABLE) {
        Ok(raw) if !raw.trim().is_empty() => Some(parse_bool(ENV_RELAY_ENABLE, &raw)?),
        _ => None,
    };
    let env_base_url = resolve_string("Relay base URL", ENV_RELAY_BASE_URL, None);
    let env_api_key = resolve_string("Relay API key", ENV_RELAY_API_KEY, None);

    if relay_toml.is_none() && env_enable.is_none() && env_base_url.is_none() && env_api_key.is_none()
    {
        return Ok(None);
    }

    let empty = RelaySection::default();
    let relay_toml = relay_toml.unwrap_or(&empty);

    Ok(Some(RelaySettings {
        enable: env_enable.unwrap_or(relay_toml.enable),
        base_url: resolve_string(
            "Relay base URL",
            ENV_RELAY_BASE_URL,
            relay_toml.base_url.as_deref(),
        ),
        api_key: resolve_string(
            "Relay API key",
            ENV_RELAY_API_KEY,
            relay_toml.api_key.as_deref(),
        ),
        default_authors: non_blank(relay_toml.default_authors.as_deref()),
        mapping: MeasurementMapping::new(
            relay_toml.filter_mapping.clone(),
            relay_toml.instrument_mapping.clone(),
        ),
    }))
}

/// Resolve one value with ENV → TOML priority
///
/// Blank values are treated as absent. Warns when both sources are set.
fn resolve_string(label: &str, env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_value = std::env::var(env_var)
        .ok()
        .and_then(|v| non_blank(Some(&v)));
    let toml_value = non_blank(toml_value);

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in environment ({}) and TOML config. Using environment.",
            label, env_var
        );
    }

    if env_value.is_some() {
        debug!("{} loaded from environment variable", label);
        return env_value;
    }
    if toml_value.is_some() {
        debug!("{} loaded from TOML config", label);
    }
    toml_value
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_bool(name: &str, raw: &str) -> SubmissionResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(SubmissionError::Configuration(format!(
            "{} must be true or false, got '{}'",
            name, other
        ))),
    }
}
