use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_ELECTION_NAME;
use crate::constants::DEFAULT_ELECTION_PATH;
use crate::Error;
use crate::Result;

/// Leader election lease timings
///
/// The renew deadline must outlive the retry period, and the lease must
/// outlive the renew deadline by more than one retry period. A leader steps
/// down at the renew deadline and has the rest of the lease to drain.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ElectionSettings {
    /// Election name, used in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Registry key holding the leadership lease
    #[serde(default = "default_path")]
    pub path: String,

    /// How long an acquired lease stays valid without renewal
    #[serde(default = "default_lease_duration_ms")]
    pub lease_duration_ms: u64,

    /// How long the leader keeps retrying renewal before stepping down
    #[serde(default = "default_renew_deadline_ms")]
    pub renew_deadline_ms: u64,

    /// Wait between acquire/renew attempts
    #[serde(default = "default_retry_period_ms")]
    pub retry_period_ms: u64,
}

impl Default for ElectionSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            path: default_path(),
            lease_duration_ms: default_lease_duration_ms(),
            renew_deadline_ms: default_renew_deadline_ms(),
            retry_period_ms: default_retry_period_ms(),
        }
    }
}

impl ElectionSettings {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "election.name cannot be empty".into(),
            )));
        }

        if self.path.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "election.path cannot be empty".into(),
            )));
        }

        if self.retry_period_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "election.retry_period_ms must be greater than 0".into(),
            )));
        }

        if self.renew_deadline_ms <= self.retry_period_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "election.renew_deadline_ms ({}) must be greater than retry_period_ms ({})",
                self.renew_deadline_ms, self.retry_period_ms
            ))));
        }

        if self.lease_duration_ms <= self.renew_deadline_ms.saturating_add(self.retry_period_ms) {
            return Err(Error::Config(ConfigError::Message(format!(
                "election.lease_duration_ms ({}) must be greater than renew_deadline_ms ({}) + retry_period_ms ({})",
                self.lease_duration_ms, self.renew_deadline_ms, self.retry_period_ms
            ))));
        }

        Ok(())
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::from_millis(self.lease_duration_ms)
    }

    pub fn renew_deadline(&self) -> Duration {
        Duration::from_millis(self.renew_deadline_ms)
    }

    pub fn retry_period(&self) -> Duration {
        Duration::from_millis(self.retry_period_ms)
    }
}

fn default_name() -> String {
    DEFAULT_ELECTION_NAME.to_string()
}
fn default_path() -> String {
    DEFAULT_ELECTION_PATH.to_string()
}
fn default_lease_duration_ms() -> u64 {
    30_000
}
fn default_renew_deadline_ms() -> u64 {
    20_000
}
fn default_retry_period_ms() -> u64 {
    5_000
}
