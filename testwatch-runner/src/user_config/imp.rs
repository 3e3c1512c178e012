// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::discovery::config_paths;
use crate::{errors::ConfigError, reconciler::ReconnectPolicy};
use camino::Utf8Path;
use serde::Deserialize;
use std::{collections::BTreeSet, io, time::Duration};
use tracing::{debug, warn};

/// Special value for `--config` and `TESTWATCH_CONFIG` that skips loading a
/// config file entirely.
pub const CONFIG_NONE: &str = "none";

/// The environment variable naming the config file.
pub const CONFIG_ENV: &str = "TESTWATCH_CONFIG";

/// Specifies where to load configuration from.
#[derive(Clone, Copy, Debug)]
pub enum ConfigLocation<'a> {
    /// Discover the config file from default locations (e.g.,
    /// `~/.config/testwatch/config.toml`).
    Default,

    /// Skip the config file entirely, using only built-in defaults.
    Isolated,

    /// Load the config file from an explicit path.
    ///
    /// Returns an error if the file does not exist.
    Explicit(&'a Utf8Path),
}

impl<'a> ConfigLocation<'a> {
    /// Creates a config location from a CLI or environment variable value.
    ///
    /// Returns `Default` if `None`, `Isolated` if `"none"`, otherwise
    /// `Explicit` with the path.
    pub fn from_cli_or_env(s: Option<&'a str>) -> Self {
        match s {
            None => Self::Default,
            Some(s) if s == CONFIG_NONE => Self::Isolated,
            Some(s) => Self::Explicit(Utf8Path::new(s)),
        }
    }
}

/// Configuration after the config file has been layered over the defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchConfig {
    /// Event stream settings.
    pub stream: StreamConfig,

    /// Output settings.
    pub display: DisplayConfig,
}

/// Resolved `[stream]` settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// The event stream endpoint.
    pub url: String,

    /// The delay before subscribing again after the stream drops.
    pub reconnect_delay: Duration,

    /// The timeout for establishing a connection.
    pub connect_timeout: Duration,
}

/// Resolved `[display]` settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Whether to print info records beneath each sub-test.
    pub show_infos: bool,
}

impl WatchConfig {
    /// Loads configuration from `location`, layered over the built-in defaults.
    pub fn load(location: ConfigLocation<'_>) -> Result<Self, ConfigError> {
        Self::load_with_warnings(location, &mut DefaultConfigWarnings)
    }

    fn load_with_warnings(
        location: ConfigLocation<'_>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigError> {
        let user_config = DeserializedConfig::from_location_with_warnings(location, warnings)?;
        let config = Self::resolve(DefaultConfig::from_embedded(), user_config.unwrap_or_default());
        validate_url(&config.stream.url)?;
        Ok(config)
    }

    fn resolve(default: DefaultConfig, user: DeserializedConfig) -> Self {
        Self {
            stream: StreamConfig {
                url: user.stream.url.unwrap_or(default.stream.url),
                reconnect_delay: user
                    .stream
                    .reconnect_delay
                    .unwrap_or(default.stream.reconnect_delay),
                connect_timeout: user
                    .stream
                    .connect_timeout
                    .unwrap_or(default.stream.connect_timeout),
            },
            display: DisplayConfig {
                show_infos: user.display.show_infos.unwrap_or(default.display.show_infos),
            },
        }
    }

    /// Overrides the stream URL, for example from the command line.
    pub fn set_url(&mut self, url: impl Into<String>) -> Result<(), ConfigError> {
        let url = url.into();
        validate_url(&url)?;
        self.stream.url = url;
        Ok(())
    }

    /// Returns the reconnect policy described by this configuration.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.stream.reconnect_delay)
    }
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: url.to_owned(),
        reason,
    };
    let parsed = reqwest::Url::parse(url).map_err(|error| invalid(error.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!(
            "unsupported scheme `{other}` (expected http or https)"
        ))),
    }
}

/// Handles warnings produced while loading configuration.
trait ConfigWarnings {
    /// Handle unknown configuration keys found in a config file.
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>);
}

struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>) {
        let mut unknown_str = String::new();
        if let (1, Some(key)) = (unknown.len(), unknown.first()) {
            // Print this on the same line.
            unknown_str.push_str("key: ");
            unknown_str.push_str(key);
        } else {
            unknown_str.push_str("keys:\n");
            for ignored_key in unknown {
                unknown_str.push('\n');
                unknown_str.push_str("  - ");
                unknown_str.push_str(ignored_key);
            }
        }

        warn!("in config file {config_file}, ignoring unknown configuration {unknown_str}");
    }
}

/// The config file, with every setting optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeserializedConfig {
    #[serde(default)]
    stream: DeserializedStreamConfig,

    #[serde(default)]
    display: DeserializedDisplayConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeserializedStreamConfig {
    #[serde(default)]
    url: Option<String>,

    #[serde(default, with = "humantime_serde::option")]
    reconnect_delay: Option<Duration>,

    #[serde(default, with = "humantime_serde::option")]
    connect_timeout: Option<Duration>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeserializedDisplayConfig {
    #[serde(default)]
    show_infos: Option<bool>,
}

impl DeserializedConfig {
    fn from_location_with_warnings(
        location: ConfigLocation<'_>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Option<Self>, ConfigError> {
        match location {
            ConfigLocation::Isolated => {
                debug!("config: skipping (isolated)");
                Ok(None)
            }
            ConfigLocation::Explicit(path) => {
                debug!("config: loading from explicit path {path}");
                match Self::from_path_with_warnings(path, warnings)? {
                    Some(config) => Ok(Some(config)),
                    None => Err(ConfigError::FileNotFound {
                        path: path.to_owned(),
                    }),
                }
            }
            ConfigLocation::Default => {
                for path in config_paths()? {
                    if let Some(config) = Self::from_path_with_warnings(&path, warnings)? {
                        return Ok(Some(config));
                    }
                }
                debug!("config: no config file found at default locations");
                Ok(None)
            }
        }
    }

    fn from_path_with_warnings(
        path: &Utf8Path,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Option<Self>, ConfigError> {
        debug!("config: attempting to load from {path}");
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!("config: file does not exist at {path}");
                return Ok(None);
            }
            Err(error) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    error,
                });
            }
        };

        let (config, unknown) =
            Self::deserialize_toml(&contents).map_err(|error| ConfigError::Parse {
                path: path.to_owned(),
                error,
            })?;

        if !unknown.is_empty() {
            warnings.unknown_config_keys(path, &unknown);
        }

        debug!("config: loaded successfully from {path}");
        Ok(Some(config))
    }

    fn deserialize_toml(contents: &str) -> Result<(Self, BTreeSet<String>), toml::de::Error> {
        let deserializer = toml::Deserializer::parse(contents)?;
        let mut unknown = BTreeSet::new();
        let config: DeserializedConfig = serde_ignored::deserialize(deserializer, |path| {
            unknown.insert(path.to_string());
        })?;
        Ok((config, unknown))
    }
}

/// The embedded defaults, with every setting required.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DefaultConfig {
    stream: DefaultStreamConfig,
    display: DefaultDisplayConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DefaultStreamConfig {
    url: String,
    #[serde(with = "humantime_serde")]
    reconnect_delay: Duration,
    #[serde(with = "humantime_serde")]
    connect_timeout: Duration,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DefaultDisplayConfig {
    show_infos: bool,
}

impl DefaultConfig {
    const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Parses the embedded defaults.
    ///
    /// Panics if the embedded TOML is invalid or contains unknown keys.
    fn from_embedded() -> Self {
        let deserializer = toml::Deserializer::parse(Self::DEFAULT_CONFIG)
            .expect("embedded default config should parse");
        let mut unknown = BTreeSet::new();
        let config: DefaultConfig =
            serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
                unknown.insert(path.to_string());
            })
            .expect("embedded default config should be valid");

        if !unknown.is_empty() {
            panic!(
                "found unknown keys in default config: {}",
                unknown.into_iter().collect::<Vec<_>>().join(", ")
            );
        }
        config
    }
}
