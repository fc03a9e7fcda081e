// -
// Registry layout

/// Root under which nodes and subscriptions live
pub(crate) const DEFAULT_REGISTRY_ROOT: &str = "/registry";

pub(crate) const NODES_SEGMENT: &str = "nodes";
pub(crate) const SUBSCRIPTIONS_SEGMENT: &str = "subscriptions";

// -
// Leader election

pub(crate) const DEFAULT_ELECTION_NAME: &str = "push-consumer";
pub(crate) const DEFAULT_ELECTION_PATH: &str = "leader/election";

/// Upper bound of the random extra wait added to every campaign retry
pub(crate) const ELECTION_JITTER_FACTOR: f64 = 0.2;

// -
// Task groups

pub(crate) const COORDINATOR_GROUP: &str = "push-consumer";
pub(crate) const LEADERSHIP_GROUP: &str = "leadership";
