use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;
use tracing::error;

use super::Pair;
use super::Registry;
use super::WatchConfig;
use super::WatchType;
use super::Watcher;
use crate::metrics::WATCH_FAILURES;
use crate::metrics::WATCH_NOTIFICATIONS;
use crate::Result;

/// One registered watch with explicit run/stop control.
///
/// Clones share the underlying watcher: one clone runs it inside a task
/// group while another (usually a reaper task) stops it.
#[derive(Clone)]
pub struct WatchSession {
    watch_type: WatchType,
    path: Arc<str>,
    watcher: Arc<dyn Watcher>,
    stopped: Arc<AtomicBool>,
}

impl fmt::Debug for WatchSession {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("WatchSession")
            .field("watch_type", &self.watch_type)
            .field("path", &self.path)
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish()
    }
}

impl WatchSession {
    /// Validates `config` and registers it with `registry`.
    ///
    /// The handler is wrapped to count deliveries per path.
    pub fn register(
        registry: &dyn Registry,
        config: WatchConfig,
    ) -> Result<Self> {
        config.validate()?;

        let path: Arc<str> = Arc::from(config.watch_path.as_str());
        let watch_type = config.watch_type;
        let handler = config.handler.clone();
        let label = path.clone();
        let instrumented = WatchConfig {
            handler: Arc::new(move |pairs: Vec<Pair>| {
                WATCH_NOTIFICATIONS.with_label_values(&[&*label]).inc();
                handler(pairs)
            }),
            ..config
        };

        let watcher = registry.watch(instrumented)?;
        debug!(path = %path, %watch_type, "watch session registered");

        Ok(Self {
            watch_type,
            path,
            watcher,
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Runs the watch until it is stopped or fails.
    pub async fn run(&self) -> Result<()> {
        debug!(path = %self.path, "watch session running");
        let result = self.watcher.start_watch().await;
        match &result {
            Ok(()) => debug!(path = %self.path, "watch session ended"),
            Err(e) => {
                WATCH_FAILURES.with_label_values(&[&*self.path]).inc();
                error!(path = %self.path, "watch session failed: {:?}", e);
            }
        }
        result
    }

    /// Signals the watch to end. Only the first call reaches the watcher.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!(path = %self.path, "stopping watch session");
            self.watcher.stop_watch();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn watch_type(&self) -> WatchType {
        self.watch_type
    }
}
