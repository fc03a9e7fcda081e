//! Push-Consumer Coordinator Error Hierarchy
//!
//! Errors are grouped by the collaborator that raised them. Every failure
//! bubbles to the nearest task group, which cancels its siblings and reports
//! the first error it saw.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Registry access and watch failures
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Leader election failures
    #[error(transparent)]
    Election(#[from] ElectionError),

    /// Coordinator lifecycle misuse
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Dependency probe failures
    #[error(transparent)]
    Health(#[from] HealthError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Explicit stop. Used only to cancel the coordinator's task group,
    /// never a fault.
    #[error("signal received, stopping push-consumer")]
    StopRequested,

    /// A grouped task panicked or was aborted
    #[error("Task in group {group} failed: {source}")]
    TaskFailed {
        group: String,
        #[source]
        source: JoinError,
    },

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// Returns `true` when this error only records a `stop()` request.
    pub fn is_stop_requested(&self) -> bool {
        matches!(self, Error::StopRequested)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Registry could not be reached (connect, watch or probe)
    #[error("Registry unreachable: {0}")]
    Unreachable(String),

    /// Watch configuration rejected before registration
    #[error("Invalid watch config: {0}")]
    InvalidWatch(String),

    /// `start_watch` called on a watcher that was already started
    #[error("Watch on {0} already started")]
    WatchAlreadyStarted(String),

    /// Established watch terminated abnormally
    #[error("Watch on {path} failed: {reason}")]
    WatchFailed { path: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ElectionError {
    /// Lease timings or identifiers rejected
    #[error("Invalid election config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Coordinator already started")]
    AlreadyStarted,

    #[error("Coordinator already stopped")]
    AlreadyStopped,

    /// A second leadership session was requested while one is still installed
    #[error("Leadership session already active on node {node_id}")]
    SessionAlreadyActive { node_id: String },
}

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("Health probe {name} timed out after {timeout:?}")]
    ProbeTimeout { name: String, timeout: Duration },
}
