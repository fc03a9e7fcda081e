//! Fluent construction of a [`ServiceCoordinator`].
//!
//! Every collaborator has a production default:
//! - registry: a fresh in-process [`MemoryRegistry`]
//! - election: [`LeaseCandidateFactory`]
//! - topology handling: [`LoggingTopologyListener`]
//! - node identity: a random `nanoid`
//!
//! ## Example
//! ```ignore
//! let coordinator = CoordinatorBuilder::new(CoordinatorConfig::new()?)
//!     .with_registry(Arc::new(registry))
//!     .with_topology_listener(Arc::new(MyRebalancer::default()))
//!     .build()?;
//! ```

use std::sync::Arc;

use config::ConfigError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::LoggingTopologyListener;
use super::ServiceCoordinator;
use super::TopologyListener;
use crate::CandidateFactory;
use crate::CoordinatorConfig;
use crate::Error;
use crate::LeaseCandidateFactory;
use crate::MemoryRegistry;
use crate::RegistryConnector;
use crate::Result;

pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    node_id: Option<String>,
    connector: Option<Arc<dyn RegistryConnector>>,
    candidate_factory: Option<Arc<dyn CandidateFactory>>,
    listener: Option<Arc<dyn TopologyListener>>,
    parent: Option<CancellationToken>,
}

impl CoordinatorBuilder {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            node_id: None,
            connector: None,
            candidate_factory: None,
            listener: None,
            parent: None,
        }
    }

    /// Fixes the node identity instead of generating one
    pub fn with_node_id(
        mut self,
        node_id: impl Into<String>,
    ) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_registry(
        mut self,
        connector: Arc<dyn RegistryConnector>,
    ) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn with_candidate_factory(
        mut self,
        factory: Arc<dyn CandidateFactory>,
    ) -> Self {
        self.candidate_factory = Some(factory);
        self
    }

    pub fn with_topology_listener(
        mut self,
        listener: Arc<dyn TopologyListener>,
    ) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Cancelling `parent` shuts the coordinator down like a group failure
    pub fn with_parent_token(
        mut self,
        parent: CancellationToken,
    ) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Validates the configuration and assembles the coordinator.
    pub fn build(self) -> Result<ServiceCoordinator> {
        let config = self.config.validate()?;

        let node_id = self.node_id.unwrap_or_else(|| nanoid::nanoid!());
        if node_id.is_empty() || node_id.contains('/') {
            return Err(Error::Config(ConfigError::Message(format!(
                "node id must be non-empty and contain no '/', got {node_id:?}"
            ))));
        }
        debug!(%node_id, "building coordinator");

        Ok(ServiceCoordinator::new(
            node_id,
            config,
            self.connector.unwrap_or_else(|| Arc::new(MemoryRegistry::new())),
            self.candidate_factory.unwrap_or_else(|| Arc::new(LeaseCandidateFactory)),
            self.listener.unwrap_or_else(|| Arc::new(LoggingTopologyListener)),
            self.parent.unwrap_or_default(),
        ))
    }
}
