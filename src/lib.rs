//! Push-consumer coordinator.
//!
//! Every node of a publish/subscribe routing cluster runs one
//! [`ServiceCoordinator`]. It takes part in a cluster-wide leader election,
//! watches its own assignments in the shared registry and, while it leads,
//! watches node membership and subscription definitions so a
//! [`TopologyListener`] can decide on rebalancing.
//!
//! ```ignore
//! let coordinator = CoordinatorBuilder::new(CoordinatorConfig::new()?.validate()?)
//!     .with_registry(Arc::new(MemoryRegistry::new()))
//!     .build()?;
//! match coordinator.start().await {
//!     Err(e) if !e.is_stop_requested() => return Err(e),
//!     _ => {}
//! }
//! ```

mod config;
mod constants;
mod coordinator;
mod election;
mod errors;
mod health;
mod metrics;
mod registry;
pub mod utils;

pub use config::*;
pub use coordinator::*;
pub use election::*;
pub use errors::*;
pub use health::*;
pub use metrics::gather_metrics;
pub use registry::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
