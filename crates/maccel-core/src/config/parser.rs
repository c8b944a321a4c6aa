// Maccel Config Parser - TOML with Serde
// Parses remapping configuration from TOML files

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use strum_macros::{Display, EnumString};

use crate::engine::EngineConfig;
use crate::output::DEFAULT_QUEUE_CAPACITY;
use crate::shortpress::DEFAULT_SHORT_PRESS_THRESHOLD;
use crate::tap::TapConfig;
use crate::{KeyCode, RemappingPair, RemappingTable};

/// Configuration parser errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// How remappings reach the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Rewrite events in a running event tap
    #[default]
    Tap,
    /// Install a keyboard driver mapping and exit
    Hid,
}

/// Root TOML table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigToml {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub tap: TapToml,

    /// Source key name to destination key name, in file order
    #[serde(default)]
    pub remap: IndexMap<String, String>,

    #[serde(default)]
    pub suppress: SuppressConfig,

    #[serde(default)]
    pub input_source: Vec<InputSourceToml>,
}

/// General settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    pub strategy: Option<Strategy>,
    pub short_press_threshold_ms: Option<u64>,
}

/// Event tap tunables
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TapToml {
    pub reenable_limit: Option<u32>,
    pub create_retry_delay_ms: Option<u64>,
    /// 0 turns the watchdog off
    pub watchdog_interval_ms: Option<u64>,
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuppressConfig {
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Short press of `key` selects the input source at `index`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSourceToml {
    pub key: String,
    pub index: usize,
}

/// Validated configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub strategy: Strategy,
    pub remaps: Vec<RemappingPair>,
    pub suppressed: Vec<KeyCode>,
    pub input_sources: Vec<(KeyCode, usize)>,
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            remaps: vec![],
            suppressed: vec![],
            input_sources: vec![],
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Parse a TOML configuration file
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let toml_config: ConfigToml =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;
        toml_config.to_config()
    }

    /// Default location: `~/.config/maccel/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("maccel").join("config.toml"))
    }

    /// Remapping pairs in file order
    pub fn remapping_pairs(&self) -> &[RemappingPair] {
        &self.remaps
    }

    /// Build the table to publish
    pub fn to_table(&self) -> RemappingTable {
        RemappingTable::build(self.remaps.iter().copied())
            .with_suppressed(self.suppressed.iter().copied())
            .with_input_source_taps(self.input_sources.iter().copied())
    }
}

impl ConfigToml {
    fn to_config(&self) -> Result<Config, ConfigError> {
        let mut remaps = Vec::with_capacity(self.remap.len());
        for (source, destination) in &self.remap {
            let pair = RemappingPair::new(parse_key(source)?, parse_key(destination)?);
            if pair.is_identity() {
                log::debug!("Ignoring identity remap {}", pair);
                continue;
            }
            remaps.push(pair);
        }

        let suppressed = self
            .suppress
            .keys
            .iter()
            .map(|k| parse_key(k))
            .collect::<Result<Vec<_>, _>>()?;

        let input_sources = self
            .input_source
            .iter()
            .map(|entry| Ok((parse_key(&entry.key)?, entry.index)))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        log::debug!(
            "Config: {} remaps, {} suppressed, {} input source bindings",
            remaps.len(),
            suppressed.len(),
            input_sources.len()
        );

        Ok(Config {
            strategy: self.general.strategy.unwrap_or_default(),
            remaps,
            suppressed,
            input_sources,
            engine: self.engine_config()?,
        })
    }

    fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let defaults = TapConfig::default();
        let tap = &self.tap;

        let reenable_limit = tap.reenable_limit.unwrap_or(defaults.reenable_limit);
        if reenable_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tap.reenable_limit",
                reason: "must be at least 1".to_string(),
            });
        }
        let queue_capacity = tap.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY);
        if queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tap.queue_capacity",
                reason: "must be at least 1".to_string(),
            });
        }

        let watchdog_interval = match tap.watchdog_interval_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.watchdog_interval,
        };

        Ok(EngineConfig {
            tap: TapConfig {
                reenable_limit,
                create_retry_delay: tap
                    .create_retry_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.create_retry_delay),
                watchdog_interval,
                ..defaults
            },
            short_press_threshold: self
                .general
                .short_press_threshold_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SHORT_PRESS_THRESHOLD),
            queue_capacity,
        })
    }
}

/// Parse a key name or numeric code
fn parse_key(name: &str) -> Result<KeyCode, ConfigError> {
    name.parse::<KeyCode>()
        .map_err(|_| ConfigError::InvalidKey(name.trim().to_string()))
}
