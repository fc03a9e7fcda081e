use std::collections::HashSet;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use push_coordinator::CoordinatorBuilder;
use push_coordinator::CoordinatorConfig;
use push_coordinator::ElectionSettings;
use push_coordinator::Error;
use push_coordinator::LeadershipState;
use push_coordinator::MemoryRegistry;
use push_coordinator::Pair;
use push_coordinator::Registry;
use push_coordinator::RegistryConfig;
use push_coordinator::RegistryConnector;
use push_coordinator::RegistryError;
use push_coordinator::Result;
use push_coordinator::ServiceCoordinator;
use push_coordinator::TopologyListener;
use push_coordinator::WatchConfig;
use push_coordinator::Watcher;
use tokio::task::JoinHandle;

pub const WAIT_BUDGET: Duration = Duration::from_secs(10);

/// Lease timings short enough for paused-clock tests
pub fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        election: ElectionSettings {
            lease_duration_ms: 300,
            renew_deadline_ms: 200,
            retry_period_ms: 50,
            ..ElectionSettings::default()
        },
        ..CoordinatorConfig::default()
    }
}

pub fn enable_logger() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub async fn wait_until<F>(
    what: &str,
    condition: F,
) where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_BUDGET;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

/// One event per delivery, shared by every node of a test cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Nodes { node_id: String, pairs: Vec<Pair> },
    Subscriptions { node_id: String, pairs: Vec<Pair> },
    Assignments { node_id: String, pairs: Vec<Pair> },
}

pub type DeliveryLog = Arc<Mutex<Vec<Delivery>>>;

/// Listener tagging leader-side deliveries with the node that saw them
pub struct ClusterListener {
    node_id: String,
    log: DeliveryLog,
}

impl ClusterListener {
    pub fn new(
        node_id: &str,
        log: DeliveryLog,
    ) -> Self {
        Self {
            node_id: node_id.to_string(),
            log,
        }
    }
}

impl TopologyListener for ClusterListener {
    fn on_nodes_changed(
        &self,
        pairs: &[Pair],
    ) {
        self.log.lock().push(Delivery::Nodes {
            node_id: self.node_id.clone(),
            pairs: pairs.to_vec(),
        });
    }

    fn on_subscriptions_changed(
        &self,
        pairs: &[Pair],
    ) {
        self.log.lock().push(Delivery::Subscriptions {
            node_id: self.node_id.clone(),
            pairs: pairs.to_vec(),
        });
    }

    fn on_assignments_changed(
        &self,
        node_id: &str,
        pairs: &[Pair],
    ) {
        self.log.lock().push(Delivery::Assignments {
            node_id: node_id.to_string(),
            pairs: pairs.to_vec(),
        });
    }
}

/// Node IDs of leader-side deliveries, in delivery order
pub fn leader_side_nodes(log: &DeliveryLog) -> Vec<String> {
    log.lock()
        .iter()
        .filter_map(|d| match d {
            Delivery::Nodes { node_id, .. } | Delivery::Subscriptions { node_id, .. } => Some(node_id.clone()),
            Delivery::Assignments { .. } => None,
        })
        .collect()
}

pub fn last_nodes_seen_by(
    log: &DeliveryLog,
    node: &str,
) -> Option<Vec<Pair>> {
    log.lock().iter().rev().find_map(|d| match d {
        Delivery::Nodes { node_id, pairs } if node_id == node => Some(pairs.clone()),
        _ => None,
    })
}

pub fn last_assignments_of(
    log: &DeliveryLog,
    node: &str,
) -> Option<Vec<Pair>> {
    log.lock().iter().rev().find_map(|d| match d {
        Delivery::Assignments { node_id, pairs } if node_id == node => Some(pairs.clone()),
        _ => None,
    })
}

#[derive(Debug, Default)]
pub struct WatchCounters {
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
}

/// Shared in-memory registry counting `start_watch`/`stop_watch`.
///
/// Lease calls of single holders can be cut off with [`TestRegistry::cut_lease`].
#[derive(Debug, Clone, Default)]
pub struct TestRegistry {
    pub inner: MemoryRegistry,
    pub counters: Arc<WatchCounters>,
    lease_cut: Arc<Mutex<HashSet<String>>>,
}

impl TestRegistry {
    /// Fails every later `acquire`/`release` of `holder`.
    pub fn cut_lease(
        &self,
        holder: &str,
    ) {
        self.lease_cut.lock().insert(holder.to_string());
    }

    fn check_lease(
        &self,
        holder: &str,
    ) -> Result<()> {
        if self.lease_cut.lock().contains(holder) {
            return Err(Error::from(RegistryError::Unreachable(format!(
                "lease calls cut off for {holder}"
            ))));
        }
        Ok(())
    }

    pub fn started(&self) -> usize {
        self.counters.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.counters.stopped.load(Ordering::SeqCst)
    }
}

struct CountedWatcher {
    inner: Arc<dyn Watcher>,
    counters: Arc<WatchCounters>,
}

#[async_trait]
impl Watcher for CountedWatcher {
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
impl Registry for TestRegistry {
    fn watch(
        &self,
        config: WatchConfig,
    ) -> Result<Arc<dyn Watcher>> {
        Ok(Arc::new(CountedWatcher {
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
        self.check_lease(holder)?;
        self.inner.acquire(key, holder, ttl).await
    }

    async fn release(
        &self,
        key: &str,
        holder: &str,
    ) -> Result<bool> {
        self.check_lease(holder)?;
        self.inner.release(key, holder).await
    }
}

#[async_trait]
impl RegistryConnector for TestRegistry {
    async fn connect(
        &self,
        config: &RegistryConfig,
    ) -> Result<Arc<dyn Registry>> {
        self.inner.connect(config).await?;
        Ok(Arc::new(self.clone()))
    }
}

pub struct TestNode {
    pub coordinator: Arc<ServiceCoordinator>,
    pub handle: JoinHandle<Result<()>>,
}

/// Builds and starts one coordinator sharing `registry` and `log`.
pub fn start_node(
    registry: &TestRegistry,
    node_id: &str,
    log: &DeliveryLog,
) -> TestNode {
    let coordinator = Arc::new(
        CoordinatorBuilder::new(fast_config())
            .with_node_id(node_id)
            .with_registry(Arc::new(registry.clone()))
            .with_topology_listener(Arc::new(ClusterListener::new(node_id, log.clone())))
            .build()
            .expect("valid test config"),
    );
    let runner = coordinator.clone();
    let handle = tokio::spawn(async move { runner.start().await });
    TestNode { coordinator, handle }
}

pub fn leaders(nodes: &[TestNode]) -> Vec<String> {
    nodes
        .iter()
        .filter(|n| n.coordinator.is_leader())
        .map(|n| n.coordinator.node_id().to_string())
        .collect()
}

/// Leadership state changes of every tapped node, in observation order
pub type LeadershipTimeline = Arc<Mutex<Vec<(String, LeadershipState)>>>;

/// Appends every leadership state change of `node` to `timeline`.
pub fn tap_leadership(
    node: &TestNode,
    timeline: &LeadershipTimeline,
) {
    let node_id = node.coordinator.node_id().to_string();
    let mut changes = node.coordinator.subscribe_leadership();
    let timeline = timeline.clone();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let state = *changes.borrow_and_update();
            timeline.lock().push((node_id.clone(), state));
        }
    });
}

pub fn position_of(
    timeline: &LeadershipTimeline,
    node: &str,
    state: LeadershipState,
) -> Option<usize> {
    timeline
        .lock()
        .iter()
        .position(|(node_id, s)| node_id == node && *s == state)
}
