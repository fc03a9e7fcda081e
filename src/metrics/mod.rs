use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::error;

lazy_static! {
    pub static ref LEADER_STATUS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("leader_status", "1 while the node runs a leadership session"),
        &["node_id"]
    )
    .expect("metric can not be created");

    pub static ref LEADERSHIP_TRANSITIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("leadership_transitions", "leadership sessions started and stopped"),
        &["node_id", "event"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_NOTIFICATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_notifications", "full-state deliveries per watched path"),
        &["path"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_failures", "watch sessions that ended with an error"),
        &["path"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        registry
            .register(Box::new(LEADER_STATUS.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(LEADERSHIP_TRANSITIONS.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(WATCH_NOTIFICATIONS.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(WATCH_FAILURES.clone()))
            .expect("collector can be registered");
        registry
    };
}

/// Renders every coordinator metric in the prometheus text format.
pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode metrics: {:?}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
