//! Push-consumer coordination core.
//!
//! A [`ServiceCoordinator`] takes part in leader election, watches its own
//! assignment path and, while it leads, runs a [`LeadershipSession`] watching
//! cluster-wide node membership and subscription definitions.

mod builder;
mod leadership;
mod listener;
mod service;

pub use builder::*;
pub use leadership::*;
pub use listener::*;
pub use service::*;
