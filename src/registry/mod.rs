//! Registry abstraction consumed by the coordinator.
//!
//! A registry is a key-value store with watches. The coordinator relies on two
//! properties of every implementation:
//! - a watch delivers the *full* current set of matching pairs on each change,
//!   never a diff
//! - handler invocations of one watch never overlap
//!
//! [`MemoryRegistry`] is the bundled in-process implementation.

mod memory;
mod watch_session;
pub use memory::*;
pub use watch_session::*;


use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;

use crate::RegistryConfig;
use crate::RegistryError;
use crate::Result;

/// One key/value entry as seen by a watch
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pair {
    pub key: String,
    pub value: Bytes,
}

impl Pair {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<Bytes>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Which keys a watch matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchType {
    /// Only the key equal to the watch path
    Exact,
    /// Every key starting with the watch path
    KeyPrefix,
}

impl WatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchType::Exact => "exact",
            WatchType::KeyPrefix => "keyprefix",
        }
    }

    pub fn matches(
        &self,
        path: &str,
        key: &str,
    ) -> bool {
        match self {
            WatchType::Exact => key == path,
            WatchType::KeyPrefix => key.starts_with(path),
        }
    }
}

impl fmt::Display for WatchType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchType {
    type Err = RegistryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "exact" => Ok(WatchType::Exact),
            "keyprefix" => Ok(WatchType::KeyPrefix),
            other => Err(RegistryError::InvalidWatch(format!("unknown watch type {other:?}"))),
        }
    }
}

/// Receives the full current set of matching pairs.
///
/// Invoked sequentially per watch. May still be running while the owning
/// session is shutting down, so it must not block on that session.
pub type WatchHandler = Arc<dyn Fn(Vec<Pair>) + Send + Sync>;

/// A registered interest in a registry key or subtree
#[derive(Clone)]
pub struct WatchConfig {
    pub watch_type: WatchType,
    pub watch_path: String,
    pub handler: WatchHandler,
}

impl fmt::Debug for WatchConfig {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("WatchConfig")
            .field("watch_type", &self.watch_type)
            .field("watch_path", &self.watch_path)
            .finish_non_exhaustive()
    }
}

impl WatchConfig {
    pub fn new(
        watch_type: WatchType,
        watch_path: impl Into<String>,
        handler: impl Fn(Vec<Pair>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            watch_type,
            watch_path: watch_path.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.watch_path.is_empty() {
            return Err(RegistryError::InvalidWatch("watch path cannot be empty".into()).into());
        }
        Ok(())
    }
}

/// A single running watch
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Watcher: Send + Sync + 'static {
    /// Blocks until the watch is stopped (`Ok`) or fails (`Err`).
    async fn start_watch(&self) -> Result<()>;

    /// Signals teardown. Idempotent, never blocks on in-flight handlers, and
    /// safe to call before `start_watch` or after it returned.
    fn stop_watch(&self);
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Registry: Send + Sync + 'static {
    /// Registers a watch; it is not active until `start_watch` runs.
    fn watch(
        &self,
        config: WatchConfig,
    ) -> Result<Arc<dyn Watcher>>;

    async fn is_alive(&self) -> Result<bool>;

    async fn put(
        &self,
        key: &str,
        value: Bytes,
    ) -> Result<()>;

    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<Bytes>>;

    async fn delete(
        &self,
        key: &str,
    ) -> Result<()>;

    /// Takes or renews a time-bounded lock on `key` for `holder`.
    ///
    /// Succeeds when the lock is free, expired, or already held by `holder`.
    async fn acquire(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool>;

    /// Drops the lock if `holder` owns it. Returns whether it did.
    async fn release(
        &self,
        key: &str,
        holder: &str,
    ) -> Result<bool>;
}

/// Builds the registry handle when the coordinator starts
#[async_trait]
pub trait RegistryConnector: Send + Sync + 'static {
    async fn connect(
        &self,
        config: &RegistryConfig,
    ) -> Result<Arc<dyn Registry>>;
}
