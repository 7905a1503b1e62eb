//! WeaveDI configuration
//!
//! Typed settings that control the diagnostics surrounding the registry:
//! which log categories are emitted, whether concurrent first resolutions are
//! coalesced, and how health checks react to problems. None of these change
//! resolution semantics.

pub mod error;
pub mod manager;
pub mod types;

pub use error::{ConfigError, Result};
pub use manager::ConfigManager;
pub use types::{ConfigStore, DiLogLevel, HealthConfig, RegistryConfig};
