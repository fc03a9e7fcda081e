//! Configuration management for the push-consumer coordinator.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Section-wise validation
mod election;
mod health;
mod registry;
pub use election::*;
pub use health::*;
pub use registry::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

const ENV_PREFIX: &str = "COORDINATOR";

/// Main configuration container for the coordinator
///
/// Merging order (later sources override earlier):
/// 1. Default values from code
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables with `COORDINATOR__` prefix
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct CoordinatorConfig {
    /// Registry connection and key layout
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Leader election lease timings
    #[serde(default)]
    pub election: ElectionSettings,
    /// Dependency probe settings
    #[serde(default)]
    pub health: HealthConfig,
}

impl Debug for CoordinatorConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CoordinatorConfig")
            .field("registry", &self.registry)
            .field("election", &self.election)
            .field("health", &self.health)
            .finish()
    }
}

impl CoordinatorConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Validation is deferred so callers can layer `with_override_config()`
    /// first; `validate()` must run before the config is used.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/coordinator.toml");
    /// std::env::set_var("COORDINATOR__ELECTION__RETRY_PERIOD_MS", "2000");
    /// let cfg = CoordinatorConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from file without validation.
    ///
    /// Environment variables keep the highest priority.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.registry.validate()?;
        self.election.validate()?;
        self.health.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
