//! Configuration file model and validation

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigErrors, RelayError};
use crate::targets::{Target, TargetRegistry};

const DEFAULT_LINK_TIMEOUT_MS: u64 = 2000;
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_MAX_LOG_FILES: usize = 5;

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default)]
    pub listen_addr: String,
    #[serde(default)]
    pub session: Vec<SessionConfig>,
    #[serde(default)]
    pub target: Vec<Target>,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One chat network connection
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub id: String,
    pub server: String,
    pub nick: String,
    pub ident: Option<String>,
    pub real_name: Option<String>,
    pub password: Option<String>,
    /// Connect over TLS, checking the server certificate.
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub channels: Vec<String>,
}

impl SessionConfig {
    /// Falls back to the nick when no ident is set.
    pub fn ident(&self) -> &str {
        self.ident
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.nick)
    }

    /// Falls back to the nick when no real name is set.
    pub fn real_name(&self) -> &str {
        self.real_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.nick)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default)]
    pub enabled: bool,
    pub shortener: Option<String>,
    #[serde(default = "default_link_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            shortener: None,
            timeout_ms: DEFAULT_LINK_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    pub directory: Option<PathBuf>,
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            directory: None,
            max_files: DEFAULT_MAX_LOG_FILES,
        }
    }
}

fn default_link_timeout_ms() -> u64 {
    DEFAULT_LINK_TIMEOUT_MS
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

fn default_max_log_files() -> usize {
    DEFAULT_MAX_LOG_FILES
}

impl RelayConfig {
    /// Parse configuration from TOML text without validating it
    pub fn from_toml(text: &str) -> Result<Self, RelayError> {
        Ok(toml::from_str(text)?)
    }

    /// Session id -> channels that session is configured to join.
    pub fn channels_by_session(&self) -> HashMap<String, HashSet<String>> {
        self.session
            .iter()
            .map(|s| (s.id.clone(), s.channels.iter().cloned().collect()))
            .collect()
    }

    pub fn target_registry(&self) -> TargetRegistry {
        TargetRegistry::new(self.target.clone())
    }

    /// Reports every problem in the configuration at once.
    pub fn validate(&self) -> Result<(), ConfigErrors> {
        let mut errors = ConfigErrors::default();

        if self.session.is_empty() {
            errors.push(ConfigError::NoSessions);
        }
        let mut seen = HashSet::new();
        for (index, session) in self.session.iter().enumerate() {
            if session.id.is_empty() {
                errors.push(ConfigError::EmptySessionId { index });
                continue;
            }
            if !seen.insert(session.id.as_str()) {
                errors.push(ConfigError::DuplicateSession {
                    id: session.id.clone(),
                });
            }
            if session.server.trim().is_empty() {
                errors.push(ConfigError::EmptyServer {
                    id: session.id.clone(),
                });
            }
            if session.nick.trim().is_empty() {
                errors.push(ConfigError::MissingNick {
                    id: session.id.clone(),
                });
            }
            if session.channels.is_empty() {
                errors.push(ConfigError::NoChannels {
                    id: session.id.clone(),
                });
            }
        }

        self.target_registry().collect_errors(
            &self.listen_addr,
            &self.channels_by_session(),
            &mut errors,
        );

        errors.into_result()
    }
}

/// Load, parse and validate the configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<RelayConfig, RelayError> {
    let path = path.as_ref();
    let config_str = std::fs::read_to_string(path).map_err(|e| {
        RelayError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let config = RelayConfig::from_toml(&config_str).map_err(|e| {
        RelayError::ConfigError(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    config.validate()?;
    Ok(config)
}
