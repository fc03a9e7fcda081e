use std::time::Duration;

use push_coordinator::CoordinatorState;
use push_coordinator::LeadershipState;

use crate::common::enable_logger;
use crate::common::leaders;
use crate::common::start_node;
use crate::common::wait_until;
use crate::common::DeliveryLog;
use crate::common::TestRegistry;

#[tokio::test(start_paused = true)]
async fn test_stop_terminates_every_node_and_watch() {
    enable_logger();
    let registry = TestRegistry::default();
    let log = DeliveryLog::default();
    let nodes: Vec<_> = ["n1", "n2", "n3"]
        .iter()
        .map(|id| start_node(&registry, id, &log))
        .collect();
    wait_until("a leader", || leaders(&nodes).len() == 1).await;

    for node in nodes {
        let stopped = tokio::time::timeout(Duration::from_secs(5), node.coordinator.stop()).await;
        assert!(stopped.is_ok(), "stop did not return");

        let result = tokio::time::timeout(Duration::from_secs(5), node.handle)
            .await
            .expect("start returned")
            .unwrap();
        assert!(result.unwrap_err().is_stop_requested());
        assert_eq!(node.coordinator.state(), CoordinatorState::Stopped);
        assert!(!node.coordinator.leadership_state().is_active());

        // A second stop neither panics nor blocks.
        tokio::time::timeout(Duration::from_secs(1), node.coordinator.stop())
            .await
            .expect("second stop returned");
    }

    assert!(registry.started() > 0);
    assert_eq!(registry.started(), registry.stopped());
}

#[tokio::test(start_paused = true)]
async fn test_stop_leader_reports_closed_session() {
    enable_logger();
    let registry = TestRegistry::default();
    let log = DeliveryLog::default();
    let node = start_node(&registry, "solo", &log);
    wait_until("solo leads", || node.coordinator.is_leader()).await;

    let mut leadership = node.coordinator.subscribe_leadership();
    node.coordinator.stop().await;

    assert_eq!(*leadership.borrow_and_update(), LeadershipState::Closed);
    assert!(node.handle.await.unwrap().is_err());
}
