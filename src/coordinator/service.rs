use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::LeadershipSession;
use super::LeadershipState;
use super::TopologyListener;
use crate::constants::COORDINATOR_GROUP;
use crate::election::StartedLeadingFn;
use crate::election::StoppedLeadingFn;
use crate::utils::TaskGroup;
use crate::CandidateFactory;
use crate::CoordinatorConfig;
use crate::ElectionConfig;
use crate::Error;
use crate::LeaderCallbacks;
use crate::LifecycleError;
use crate::Registry;
use crate::RegistryConnector;
use crate::RegistryError;
use crate::RegistryHealthChecker;
use crate::Result;
use crate::WatchConfig;
use crate::WatchSession;
use crate::WatchType;

/// `Created -> Running -> Stopping -> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Created,
    Running,
    Stopping,
    Stopped,
}

type LeadershipSlot = Arc<Mutex<Option<LeadershipSession>>>;

/// Top-level lifecycle owner of one push-consumer node.
///
/// [`ServiceCoordinator::start`] runs until the first failure or an explicit
/// [`ServiceCoordinator::stop`]. It is terminal: once `start` returned, the
/// coordinator cannot be started again.
pub struct ServiceCoordinator {
    node_id: String,
    config: CoordinatorConfig,
    connector: Arc<dyn RegistryConnector>,
    candidate_factory: Arc<dyn CandidateFactory>,
    listener: Arc<dyn TopologyListener>,
    parent: CancellationToken,

    registry: RwLock<Option<Arc<dyn Registry>>>,
    leadership: LeadershipSlot,
    leadership_state: Arc<watch::Sender<LeadershipState>>,
    state: watch::Sender<CoordinatorState>,
    stop_signal: watch::Sender<bool>,
}

impl fmt::Debug for ServiceCoordinator {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ServiceCoordinator")
            .field("node_id", &self.node_id)
            .field("state", &self.state())
            .field("leadership", &self.leadership_state())
            .finish_non_exhaustive()
    }
}

impl ServiceCoordinator {
    pub(super) fn new(
        node_id: String,
        config: CoordinatorConfig,
        connector: Arc<dyn RegistryConnector>,
        candidate_factory: Arc<dyn CandidateFactory>,
        listener: Arc<dyn TopologyListener>,
        parent: CancellationToken,
    ) -> Self {
        let (leadership_state, _) = watch::channel(LeadershipState::Idle);
        let (state, _) = watch::channel(CoordinatorState::Created);
        let (stop_signal, _) = watch::channel(false);

        Self {
            node_id,
            config,
            connector,
            candidate_factory,
            listener,
            parent,
            registry: RwLock::new(None),
            leadership: Arc::new(Mutex::new(None)),
            leadership_state: Arc::new(leadership_state),
            state,
            stop_signal,
        }
    }

    /// Runs the coordinator until the first failure or an explicit stop.
    ///
    /// Connects to the registry, then runs three tasks in one group: the
    /// election, this node's assignment watch and the stop listener. Returns
    /// once every task, and any leadership session, has terminated. After
    /// [`ServiceCoordinator::stop`] the result is `Err(Error::StopRequested)`;
    /// see [`Error::is_stop_requested`].
    pub async fn start(&self) -> Result<()> {
        self.transition_to_running()?;
        info!(node_id = %self.node_id, "starting push-consumer coordinator");

        let result = self.run().await;

        self.state.send_if_modified(|state| {
            let changed = *state == CoordinatorState::Running;
            if changed {
                *state = CoordinatorState::Stopping;
            }
            changed
        });

        let leftover = self.leadership.lock().take();
        if let Some(session) = leftover {
            warn!(node_id = %self.node_id, "leadership session still installed after shutdown, draining");
            if let Err(e) = session.close().await {
                warn!(node_id = %self.node_id, "leftover leadership session failed: {:?}", e);
            }
        }

        match &result {
            Ok(()) => info!(node_id = %self.node_id, "coordinator finished"),
            Err(e) if e.is_stop_requested() => info!(node_id = %self.node_id, "coordinator stopped"),
            Err(e) => error!(node_id = %self.node_id, "coordinator failed: {:?}", e),
        }

        self.state.send_replace(CoordinatorState::Stopped);
        result
    }

    /// Signals the coordinator to stop and waits until `start` has returned.
    ///
    /// Safe to call any number of times, concurrently or before `start`.
    pub async fn stop(&self) {
        self.state.send_if_modified(|state| match *state {
            CoordinatorState::Created => {
                *state = CoordinatorState::Stopped;
                true
            }
            CoordinatorState::Running => {
                *state = CoordinatorState::Stopping;
                true
            }
            CoordinatorState::Stopping | CoordinatorState::Stopped => false,
        });
        self.stop_signal.send_replace(true);

        let mut state = self.state.subscribe();
        if state.wait_for(|s| *s == CoordinatorState::Stopped).await.is_err() {
            debug!(node_id = %self.node_id, "coordinator state channel closed");
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    pub fn leadership_state(&self) -> LeadershipState {
        *self.leadership_state.borrow()
    }

    pub fn subscribe_leadership(&self) -> watch::Receiver<LeadershipState> {
        self.leadership_state.subscribe()
    }

    /// `true` while this node runs an active leadership session
    pub fn is_leader(&self) -> bool {
        self.leadership_state().is_active()
    }

    /// The registry handle, once `start` has connected
    pub fn registry(&self) -> Option<Arc<dyn Registry>> {
        self.registry.read().clone()
    }

    /// Health check over the connected registry
    pub fn health_checker(&self) -> Option<RegistryHealthChecker> {
        self.registry().map(RegistryHealthChecker::new)
    }

    fn transition_to_running(&self) -> Result<()> {
        let mut outcome: Result<()> = Ok(());
        self.state.send_if_modified(|state| match *state {
            CoordinatorState::Created => {
                *state = CoordinatorState::Running;
                true
            }
            CoordinatorState::Running | CoordinatorState::Stopping => {
                outcome = Err(LifecycleError::AlreadyStarted.into());
                false
            }
            CoordinatorState::Stopped => {
                outcome = Err(LifecycleError::AlreadyStopped.into());
                false
            }
        });
        outcome
    }

    async fn run(&self) -> Result<()> {
        let registry = self.connect().await?;
        *self.registry.write() = Some(registry.clone());

        let election = ElectionConfig::from_settings(
            &self.config.election,
            &self.node_id,
            self.leader_callbacks(registry.clone()),
        );
        let candidate = self.candidate_factory.new_candidate(election, registry.clone())?;
        let assignments = self.assignment_watch(registry.as_ref())?;

        let mut group = TaskGroup::new(COORDINATOR_GROUP, &self.parent);
        let scope = group.token();

        let election_scope = scope.clone();
        group.spawn("election", async move { candidate.run(election_scope).await });

        let assignment_session = assignments.clone();
        group.spawn("assignment-watch", async move { assignment_session.run().await });

        let mut stop_signal = self.stop_signal.subscribe();
        let node_id = self.node_id.clone();
        group.spawn("stop-listener", async move {
            let stop_requested = tokio::select! {
                _ = scope.cancelled() => false,
                _ = async { stop_signal.wait_for(|stop| *stop).await.is_ok() } => true,
            };
            assignments.stop();

            if stop_requested {
                info!(%node_id, "stop requested");
                Err(Error::StopRequested)
            } else {
                debug!(%node_id, "coordinator scope cancelled");
                Ok(())
            }
        });

        group.wait().await
    }

    async fn connect(&self) -> Result<Arc<dyn Registry>> {
        let limit = self.config.registry.connect_timeout();
        match timeout(limit, self.connector.connect(&self.config.registry)).await {
            Ok(Ok(registry)) => {
                debug!(node_id = %self.node_id, "registry connected");
                Ok(registry)
            }
            Ok(Err(e)) => {
                error!(node_id = %self.node_id, "registry connect failed: {:?}", e);
                Err(e)
            }
            Err(_) => Err(RegistryError::Unreachable(format!("connect timed out after {limit:?}")).into()),
        }
    }

    fn assignment_watch(
        &self,
        registry: &dyn Registry,
    ) -> Result<WatchSession> {
        let listener = self.listener.clone();
        let node_id = self.node_id.clone();
        WatchSession::register(
            registry,
            WatchConfig::new(
                WatchType::KeyPrefix,
                self.config.registry.node_assignments_path(&self.node_id),
                move |pairs| listener.on_assignments_changed(&node_id, &pairs),
            ),
        )
    }

    /// `on_started_leading` installs a fresh session into the slot and
    /// returns at once; `on_stopped_leading` takes it out and resolves only
    /// when it is closed.
    fn leader_callbacks(
        &self,
        registry: Arc<dyn Registry>,
    ) -> LeaderCallbacks {
        let slot = self.leadership.clone();
        let state = self.leadership_state.clone();
        let listener = self.listener.clone();
        let registry_config = self.config.registry.clone();
        let node_id = self.node_id.clone();
        let on_started_leading: StartedLeadingFn = Arc::new(move |leading: CancellationToken| -> Result<()> {
            let mut slot = slot.lock();
            if slot.is_some() {
                return Err(LifecycleError::SessionAlreadyActive {
                    node_id: node_id.clone(),
                }
                .into());
            }

            info!(%node_id, "started leading");
            let session = LeadershipSession::start(
                &node_id,
                registry.as_ref(),
                &leading,
                listener.clone(),
                &registry_config,
                state.clone(),
            )?;
            *slot = Some(session);
            Ok(())
        });

        let slot = self.leadership.clone();
        let node_id = self.node_id.clone();
        let on_stopped_leading: StoppedLeadingFn = Arc::new(move || {
            let session = slot.lock().take();
            let node_id = node_id.clone();
            async move {
                info!(%node_id, "stopped leading");
                match session {
                    Some(session) => session.close().await,
                    None => Ok(()),
                }
            }
            .boxed()
        });

        LeaderCallbacks {
            on_started_leading,
            on_stopped_leading,
        }
    }
}
