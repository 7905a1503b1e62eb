//! Core configuration types and data structures

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Diagnostic verbosity for the registry.
///
/// Levels are cumulative: each one emits everything the previous level does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiLogLevel {
    /// No registry events at all
    Off,
    /// Failures, fallbacks and circular dependencies
    Errors,
    /// Adds registration and scope lifecycle events
    Registration,
    /// Adds cache hits and releases
    Optimization,
    /// Adds every resolution
    All,
}

impl DiLogLevel {
    /// Whether an event emitted at `category` passes this level
    pub fn allows(self, category: DiLogLevel) -> bool {
        category != DiLogLevel::Off && self >= category
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            DiLogLevel::Off => "off",
            DiLogLevel::Errors => "errors",
            DiLogLevel::Registration => "registration",
            DiLogLevel::Optimization => "optimization",
            DiLogLevel::All => "all",
        }
    }
}

impl Default for DiLogLevel {
    fn default() -> Self {
        DiLogLevel::Errors
    }
}

impl fmt::Display for DiLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiLogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(DiLogLevel::Off),
            "errors" | "error" => Ok(DiLogLevel::Errors),
            "registration" => Ok(DiLogLevel::Registration),
            "optimization" => Ok(DiLogLevel::Optimization),
            "all" => Ok(DiLogLevel::All),
            other => Err(ConfigError::UnknownLogLevel(other.to_string())),
        }
    }
}

/// Health-check behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HealthConfig {
    /// Prune orphaned cache slots and stale dependency edges during a check
    pub auto_fix: bool,
    /// Report `Unhealthy` instead of `Degraded` when a dependency is missing
    pub fail_on_missing: bool,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Which diagnostic categories reach `tracing`
    pub log_level: DiLogLevel,
    /// Coalesce concurrent first resolutions of a cached key into one factory call
    pub single_flight: bool,
    /// Longest nested resolution chain before resolution is aborted
    pub max_resolution_depth: usize,
    /// Health-check settings
    pub health: HealthConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            log_level: DiLogLevel::default(),
            single_flight: true,
            max_resolution_depth: 64,
            health: HealthConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// Parse a configuration from TOML text, filling missing fields with defaults
    pub fn from_toml_str(input: &str) -> crate::Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Builder-style override of the log level
    pub fn with_log_level(mut self, level: DiLogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Builder-style override of single-flight
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// Builder-style override of health auto-fix
    pub fn with_auto_fix(mut self, enabled: bool) -> Self {
        self.health.auto_fix = enabled;
        self
    }
}

/// Configuration store trait
pub trait ConfigStore {
    /// Load configuration
    fn load_config(&mut self) -> Result<RegistryConfig, ConfigError>;
    /// Save configuration
    fn save_config(&self, config: &RegistryConfig) -> Result<(), ConfigError>;
    /// Validate configuration
    fn validate_config(&self, config: &RegistryConfig) -> Result<(), ConfigError>;
}
