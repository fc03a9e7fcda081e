//! In-process registry.
//!
//! Keys live in an ordered map; every mutation bumps a revision counter
//! published over a `tokio::sync::watch` channel. Watchers wake on a revision
//! change, recompute their matching set and deliver it when it differs from
//! the previous delivery. Bursts of writes may coalesce into one delivery,
//! which still carries the latest full state.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::Pair;
use super::Registry;
use super::RegistryConnector;
use super::WatchConfig;
use super::WatchHandler;
use super::WatchType;
use super::Watcher;
use crate::RegistryConfig;
use crate::RegistryError;
use crate::Result;

#[derive(Debug)]
struct Lease {
    holder: String,
    expires_at: Instant,
}

#[derive(Debug)]
struct Inner {
    kv: RwLock<BTreeMap<String, Bytes>>,
    leases: DashMap<String, Lease>,
    revision: watch::Sender<u64>,
    alive: AtomicBool,
}

/// Shared, cloneable in-memory registry. Clones see the same key space.
#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    inner: Arc<Inner>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                kv: RwLock::new(BTreeMap::new()),
                leases: DashMap::new(),
                revision,
                alive: AtomicBool::new(true),
            }),
        }
    }

    /// Simulates losing (or regaining) the registry. Running watches fail on
    /// their next wake-up while the registry is down.
    pub fn set_alive(
        &self,
        alive: bool,
    ) {
        self.inner.alive.store(alive, Ordering::SeqCst);
        self.bump_revision();
    }

    pub fn alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// Current pairs matching `path` under `watch_type`, ordered by key.
    pub fn snapshot(
        &self,
        watch_type: WatchType,
        path: &str,
    ) -> Vec<Pair> {
        let kv = self.inner.kv.read();
        match watch_type {
            WatchType::Exact => kv
                .get(path)
                .map(|value| vec![Pair::new(path, value.clone())])
                .unwrap_or_default(),
            WatchType::KeyPrefix => kv
                .range(path.to_string()..)
                .take_while(|(key, _)| key.starts_with(path))
                .map(|(key, value)| Pair::new(key.clone(), value.clone()))
                .collect(),
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.alive() {
            Ok(())
        } else {
            Err(RegistryError::Unreachable("memory registry is down".into()).into())
        }
    }

    fn bump_revision(&self) {
        self.inner.revision.send_modify(|revision| *revision += 1);
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    fn watch(
        &self,
        config: WatchConfig,
    ) -> Result<Arc<dyn Watcher>> {
        config.validate()?;
        debug!(path = %config.watch_path, watch_type = %config.watch_type, "watch registered");
        Ok(Arc::new(MemoryWatcher {
            registry: self.clone(),
            watch_type: config.watch_type,
            path: config.watch_path,
            handler: config.handler,
            stop: CancellationToken::new(),
            started: AtomicBool::new(false),
        }))
    }

    async fn is_alive(&self) -> Result<bool> {
        Ok(self.alive())
    }

    async fn put(
        &self,
        key: &str,
        value: Bytes,
    ) -> Result<()> {
        self.ensure_alive()?;
        self.inner.kv.write().insert(key.to_string(), value);
        self.bump_revision();
        Ok(())
    }

    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<Bytes>> {
        self.ensure_alive()?;
        Ok(self.inner.kv.read().get(key).cloned())
    }

    async fn delete(
        &self,
        key: &str,
    ) -> Result<()> {
        self.ensure_alive()?;
        let removed = self.inner.kv.write().remove(key).is_some();
        if removed {
            self.bump_revision();
        }
        Ok(())
    }

    async fn acquire(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool> {
        self.ensure_alive()?;
        let now = Instant::now();
        let acquired = match self.inner.leases.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let lease = entry.get_mut();
                if lease.holder == holder || lease.expires_at <= now {
                    lease.holder = holder.to_string();
                    lease.expires_at = now + ttl;
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Lease {
                    holder: holder.to_string(),
                    expires_at: now + ttl,
                });
                true
            }
        };
        trace!(key, holder, acquired, "lease acquire");
        Ok(acquired)
    }

    async fn release(
        &self,
        key: &str,
        holder: &str,
    ) -> Result<bool> {
        self.ensure_alive()?;
        let released = self
            .inner
            .leases
            .remove_if(key, |_, lease| lease.holder == holder)
            .is_some();
        trace!(key, holder, released, "lease release");
        Ok(released)
    }
}

#[async_trait]
impl RegistryConnector for MemoryRegistry {
    async fn connect(
        &self,
        _config: &RegistryConfig,
    ) -> Result<Arc<dyn Registry>> {
        self.ensure_alive()?;
        Ok(Arc::new(self.clone()))
    }
}

struct MemoryWatcher {
    registry: MemoryRegistry,
    watch_type: WatchType,
    path: String,
    handler: WatchHandler,
    stop: CancellationToken,
    started: AtomicBool,
}

#[async_trait]
impl Watcher for MemoryWatcher {
    async fn start_watch(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(RegistryError::WatchAlreadyStarted(self.path.clone()).into());
        }

        let mut revision = self.registry.inner.revision.subscribe();
        let mut delivered: Option<Vec<Pair>> = None;

        loop {
            if self.stop.is_cancelled() {
                return Ok(());
            }

            // Mark before reading so a write racing the snapshot wakes us again.
            revision.borrow_and_update();
            if !self.registry.alive() {
                warn!(path = %self.path, "registry went away, watch failed");
                return Err(RegistryError::WatchFailed {
                    path: self.path.clone(),
                    reason: "registry unreachable".into(),
                }
                .into());
            }

            let pairs = self.registry.snapshot(self.watch_type, &self.path);
            if delivered.as_ref() != Some(&pairs) {
                trace!(path = %self.path, count = pairs.len(), "delivering watch snapshot");
                (self.handler)(pairs.clone());
                delivered = Some(pairs);
            }

            tokio::select! {
                biased;
                _ = self.stop.cancelled() => return Ok(()),
                changed = revision.changed() => {
                    if changed.is_err() {
                        return Err(RegistryError::WatchFailed {
                            path: self.path.clone(),
                            reason: "revision channel closed".into(),
                        }
                        .into());
                    }
                }
            }
        }
    }

    fn stop_watch(&self) {
        self.stop.cancel();
    }
}
