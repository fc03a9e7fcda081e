use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_REGISTRY_ROOT;
use crate::constants::NODES_SEGMENT;
use crate::constants::SUBSCRIPTIONS_SEGMENT;
use crate::Error;
use crate::Result;

/// Registry connection settings and key layout
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Root of the coordinator key space, e.g. `/registry`
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Upper bound for establishing the registry handle during `start`
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.root_path.starts_with('/') {
            return Err(Error::Config(ConfigError::Message(format!(
                "registry.root_path must start with '/', got {:?}",
                self.root_path
            ))));
        }

        if self.root_path.len() > 1 && self.root_path.ends_with('/') {
            return Err(Error::Config(ConfigError::Message(format!(
                "registry.root_path must not end with '/', got {:?}",
                self.root_path
            ))));
        }

        if self.connect_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "registry.connect_timeout_ms must be greater than 0".into(),
            )));
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Cluster node membership, watched by the leader
    pub fn nodes_path(&self) -> String {
        format!("{}/{}", self.root(), NODES_SEGMENT)
    }

    /// Subscription definitions, watched by the leader
    pub fn subscriptions_path(&self) -> String {
        format!("{}/{}", self.root(), SUBSCRIPTIONS_SEGMENT)
    }

    /// Subscriptions assigned to `node_id` by the current leader
    pub fn node_assignments_path(
        &self,
        node_id: &str,
    ) -> String {
        format!("{}/{}/{}", self.nodes_path(), node_id, SUBSCRIPTIONS_SEGMENT)
    }

    fn root(&self) -> &str {
        self.root_path.trim_end_matches('/')
    }
}

fn default_root_path() -> String {
    DEFAULT_REGISTRY_ROOT.to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
