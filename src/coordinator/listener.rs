use tracing::info;

use crate::Pair;

/// Receives topology as seen by the watches.
///
/// Every call carries the full current set of pairs under the watched path,
/// never a diff. Calls for one path never overlap but calls for different
/// paths may run concurrently. Implementations decide whether a rebalance is
/// needed; they must not block on the coordinator.
pub trait TopologyListener: Send + Sync + 'static {
    /// Leader only: node membership under `<root>/nodes`
    fn on_nodes_changed(
        &self,
        pairs: &[Pair],
    );

    /// Leader only: subscription definitions under `<root>/subscriptions`
    fn on_subscriptions_changed(
        &self,
        pairs: &[Pair],
    );

    /// Subscriptions the current leader assigned to `node_id`
    fn on_assignments_changed(
        &self,
        node_id: &str,
        pairs: &[Pair],
    );
}

/// Logs every delivery and takes no further action
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTopologyListener;

impl LoggingTopologyListener {
    fn keys(pairs: &[Pair]) -> Vec<&str> {
        pairs.iter().map(|p| p.key.as_str()).collect()
    }
}

impl TopologyListener for LoggingTopologyListener {
    fn on_nodes_changed(
        &self,
        pairs: &[Pair],
    ) {
        info!(count = pairs.len(), keys = ?Self::keys(pairs), "node membership changed");
    }

    fn on_subscriptions_changed(
        &self,
        pairs: &[Pair],
    ) {
        info!(count = pairs.len(), keys = ?Self::keys(pairs), "subscription definitions changed");
    }

    fn on_assignments_changed(
        &self,
        node_id: &str,
        pairs: &[Pair],
    ) {
        info!(%node_id, count = pairs.len(), keys = ?Self::keys(pairs), "assignments changed");
    }
}
