use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthConfig {
    /// Deadline applied to every broker probe, independent of the caller
    #[serde(default = "default_broker_probe_timeout_ms")]
    pub broker_probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            broker_probe_timeout_ms: default_broker_probe_timeout_ms(),
        }
    }
}

impl HealthConfig {
    pub fn validate(&self) -> Result<()> {
        if self.broker_probe_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "health.broker_probe_timeout_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn broker_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.broker_probe_timeout_ms)
    }
}

fn default_broker_probe_timeout_ms() -> u64 {
    1000
}
