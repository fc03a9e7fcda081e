use parking_lot::Mutex;

use crate::Pair;
use crate::TopologyListener;

/// Keeps every delivery so tests can inspect the latest full view.
#[derive(Debug, Default)]
pub(crate) struct RecordingListener {
    pub(crate) nodes: Mutex<Vec<Vec<Pair>>>,
    pub(crate) subscriptions: Mutex<Vec<Vec<Pair>>>,
    pub(crate) assignments: Mutex<Vec<Vec<Pair>>>,
}

impl RecordingListener {
    pub(crate) fn last_nodes(&self) -> Option<Vec<Pair>> {
        self.nodes.lock().last().cloned()
    }

    pub(crate) fn last_subscriptions(&self) -> Option<Vec<Pair>> {
        self.subscriptions.lock().last().cloned()
    }

    pub(crate) fn last_assignments(&self) -> Option<Vec<Pair>> {
        self.assignments.lock().last().cloned()
    }

    pub(crate) fn node_deliveries(&self) -> usize {
        self.nodes.lock().len()
    }
}

impl TopologyListener for RecordingListener {
    fn on_nodes_changed(
        &self,
        pairs: &[Pair],
    ) {
        self.nodes.lock().push(pairs.to_vec());
    }

    fn on_subscriptions_changed(
        &self,
        pairs: &[Pair],
    ) {
        self.subscriptions.lock().push(pairs.to_vec());
    }

    fn on_assignments_changed(
        &self,
        _node_id: &str,
        pairs: &[Pair],
    ) {
        self.assignments.lock().push(pairs.to_vec());
    }
}
