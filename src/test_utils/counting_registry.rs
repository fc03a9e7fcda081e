use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::MemoryRegistry;
use crate::Registry;
use crate::RegistryConfig;
use crate::RegistryConnector;
use crate::RegistryError;
use crate::Result;
use crate::WatchConfig;
use crate::Watcher;

#[derive(Debug, Default)]
pub(crate) struct WatchCounters {
    pub(crate) started: AtomicUsize,
    pub(crate) stopped: AtomicUsize,
}

impl WatchCounters {
    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// How lease calls of a cut-off holder misbehave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LeaseFault {
    /// `acquire` and `release` fail at once
    Fail,
    /// `acquire` never returns, `release` fails
    Hang,
}

/// [`MemoryRegistry`] wrapper counting `start_watch`/`stop_watch` calls.
///
/// Lease calls can be cut off per holder while everything else keeps working.
#[derive(Debug, Clone, Default)]
pub(crate) struct CountingRegistry {
    pub(crate) inner: MemoryRegistry,
    pub(crate) counters: Arc<WatchCounters>,
    lease_faults: Arc<Mutex<HashMap<String, LeaseFault>>>,
}

impl CountingRegistry {
    pub(crate) fn cut_lease(
        &self,
        holder: &str,
        fault: LeaseFault,
    ) {
        self.lease_faults.lock().insert(holder.to_string(), fault);
    }

    fn lease_fault(
        &self,
        holder: &str,
    ) -> Option<LeaseFault> {
        self.lease_faults.lock().get(holder).copied()
    }
}

fn lease_cut_off(holder: &str) -> crate::Error {
    RegistryError::Unreachable(format!("lease calls cut off for {holder}")).into()
}

struct CountingWatcher {
    inner: Arc<dyn Watcher>,
    counters: Arc<WatchCounters>,
}

#[async_trait]
impl Watcher for CountingWatcher {
    async fn start_watch(&self) -> Result<()> {
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        self.inner.start_watch().await
    }

    fn stop_watch(&self) {
        self.counters.stopped.fetch_add(1, Ordering::SeqCst);
        self.inner.stop_watch();
    }
}

#[async_trait]
impl Registry for CountingRegistry {
    fn watch(
        &self,
        config: WatchConfig,
    ) -> Result<Arc<dyn Watcher>> {
        Ok(Arc::new(CountingWatcher {
            inner: self.inner.watch(config)?,
            counters: self.counters.clone(),
        }))
    }

    async fn is_alive(&self) -> Result<bool> {
        self.inner.is_alive().await
    }

    async fn put(
        &self,
        key: &str,
        value: Bytes,
    ) -> Result<()> {
        self.inner.put(key, value).await
    }

    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<Bytes>> {
        self.inner.get(key).await
    }

    async fn delete(
        &self,
        key: &str,
    ) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn acquire(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool> {
        match self.lease_fault(holder) {
            Some(LeaseFault::Fail) => Err(lease_cut_off(holder)),
            Some(LeaseFault::Hang) => futures::future::pending().await,
            None => self.inner.acquire(key, holder, ttl).await,
        }
    }

    async fn release(
        &self,
        key: &str,
        holder: &str,
    ) -> Result<bool> {
        if self.lease_fault(holder).is_some() {
            return Err(lease_cut_off(holder));
        }
        self.inner.release(key, holder).await
    }
}

#[async_trait]
impl RegistryConnector for CountingRegistry {
    async fn connect(
        &self,
        config: &RegistryConfig,
    ) -> Result<Arc<dyn Registry>> {
        self.inner.connect(config).await?;
        Ok(Arc::new(self.clone()))
    }
}
