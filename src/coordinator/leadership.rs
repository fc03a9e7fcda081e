use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::TopologyListener;
use crate::constants::LEADERSHIP_GROUP;
use crate::metrics::LEADERSHIP_TRANSITIONS;
use crate::metrics::LEADER_STATUS;
use crate::utils::TaskGroup;
use crate::Registry;
use crate::RegistryConfig;
use crate::Result;
use crate::WatchConfig;
use crate::WatchSession;
use crate::WatchType;

/// Lifecycle of the leader-only work on this node.
///
/// `Idle -> Active -> Draining -> Closed`. A later term starts again at
/// `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadershipState {
    /// Never led
    Idle,
    /// Leader-only watches are running
    Active,
    /// Scope cancelled, watches are winding down
    Draining,
    /// Every leader-only task has returned
    Closed,
}

impl LeadershipState {
    pub fn is_active(&self) -> bool {
        matches!(self, LeadershipState::Active)
    }
}

/// The leader-only watches of one leadership term.
///
/// Owns a [`TaskGroup`] scoped under the leading token handed out by the
/// election: the node membership watch, the subscription definitions watch
/// and a reaper stopping both once the scope is cancelled.
pub struct LeadershipSession {
    node_id: String,
    scope: CancellationToken,
    group: TaskGroup,
    state: Arc<watch::Sender<LeadershipState>>,
}

impl fmt::Debug for LeadershipSession {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("LeadershipSession")
            .field("node_id", &self.node_id)
            .field("state", &*self.state.borrow())
            .field("tasks", &self.group.len())
            .finish()
    }
}

impl LeadershipSession {
    /// Registers and launches the leader-only watches, then returns.
    ///
    /// A failing watch cancels the session scope and `leading`, which resigns
    /// leadership; the failure is reported by [`LeadershipSession::close`].
    pub fn start(
        node_id: &str,
        registry: &dyn Registry,
        leading: &CancellationToken,
        listener: Arc<dyn TopologyListener>,
        registry_config: &RegistryConfig,
        state: Arc<watch::Sender<LeadershipState>>,
    ) -> Result<Self> {
        let nodes_listener = listener.clone();
        let nodes = WatchSession::register(
            registry,
            WatchConfig::new(WatchType::KeyPrefix, registry_config.nodes_path(), move |pairs| {
                nodes_listener.on_nodes_changed(&pairs)
            }),
        )?;

        let subscriptions = match WatchSession::register(
            registry,
            WatchConfig::new(
                WatchType::KeyPrefix,
                registry_config.subscriptions_path(),
                move |pairs| listener.on_subscriptions_changed(&pairs),
            ),
        ) {
            Ok(session) => session,
            Err(e) => {
                nodes.stop();
                return Err(e);
            }
        };

        state.send_replace(LeadershipState::Active);
        let mut group = TaskGroup::new(LEADERSHIP_GROUP, leading);
        let scope = group.token();

        for (task, session) in [("nodes-watch", nodes.clone()), ("subscriptions-watch", subscriptions.clone())] {
            let resign = leading.clone();
            group.spawn(task, async move {
                let result = session.run().await;
                if result.is_err() {
                    resign.cancel();
                }
                result
            });
        }

        let reaper_scope = scope.clone();
        let reaper_state = state.clone();
        let reaper_node = node_id.to_string();
        group.spawn("reaper", async move {
            reaper_scope.cancelled().await;
            reaper_state.send_replace(LeadershipState::Draining);
            nodes.stop();
            subscriptions.stop();
            info!(node_id = %reaper_node, "leader context returned done");
            Ok(())
        });

        LEADER_STATUS.with_label_values(&[node_id]).set(1);
        LEADERSHIP_TRANSITIONS.with_label_values(&[node_id, "started"]).inc();
        info!(%node_id, "leadership session active");

        Ok(Self {
            node_id: node_id.to_string(),
            scope,
            group,
            state,
        })
    }

    /// Cancels the session scope and waits until every task has returned.
    ///
    /// Returns the first watch failure, if any.
    pub async fn close(self) -> Result<()> {
        let Self {
            node_id,
            scope,
            group,
            state,
        } = self;

        debug!(%node_id, "draining leadership session");
        scope.cancel();
        let result = group.wait().await;

        state.send_replace(LeadershipState::Closed);
        LEADER_STATUS.with_label_values(&[&node_id]).set(0);
        LEADERSHIP_TRANSITIONS.with_label_values(&[&node_id, "stopped"]).inc();

        match &result {
            Ok(()) => info!(%node_id, "leadership session closed"),
            Err(e) => warn!(%node_id, "leadership session closed with error: {:?}", e),
        }
        result
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn state(&self) -> LeadershipState {
        *self.state.borrow()
    }
}
