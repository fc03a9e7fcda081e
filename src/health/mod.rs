//! Dependency probes exposed to the hosting process.
//!
//! Aggregation and reporting live outside this crate.


use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::time::timeout;
use tracing::warn;

use crate::HealthConfig;
use crate::HealthError;
use crate::Registry;
use crate::Result;

#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn check_health(&self) -> Result<bool>;

    fn name(&self) -> String;
}

/// Reports whether the registry is reachable
#[derive(Clone)]
pub struct RegistryHealthChecker {
    registry: Arc<dyn Registry>,
}

impl RegistryHealthChecker {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl HealthChecker for RegistryHealthChecker {
    async fn check_health(&self) -> Result<bool> {
        self.registry.is_alive().await
    }

    fn name(&self) -> String {
        "registry".to_string()
    }
}

/// Admin connection to the message broker
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BrokerAdmin: Send + Sync + 'static {
    async fn is_healthy(&self) -> Result<bool>;
}

/// Probes the broker admin connection under its own deadline, so a slow
/// broker cannot stall an aggregate check.
pub struct BrokerHealthChecker {
    admin: Arc<dyn BrokerAdmin>,
    probe_timeout: Duration,
}

impl BrokerHealthChecker {
    pub fn new(
        admin: Arc<dyn BrokerAdmin>,
        config: &HealthConfig,
    ) -> Self {
        Self {
            admin,
            probe_timeout: config.broker_probe_timeout(),
        }
    }
}

#[async_trait]
impl HealthChecker for BrokerHealthChecker {
    async fn check_health(&self) -> Result<bool> {
        match timeout(self.probe_timeout, self.admin.is_healthy()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("broker probe exceeded {:?}", self.probe_timeout);
                Err(HealthError::ProbeTimeout {
                    name: self.name(),
                    timeout: self.probe_timeout,
                }
                .into())
            }
        }
    }

    fn name(&self) -> String {
        "broker".to_string()
    }
}
