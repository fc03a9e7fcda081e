mod counting_registry;
mod recording_listener;

pub(crate) use counting_registry::*;
pub(crate) use recording_listener::*;

use std::time::Duration;

use crate::CoordinatorConfig;
use crate::ElectionSettings;

/// Lease timings short enough for paused-clock tests
pub(crate) fn fast_election_settings() -> ElectionSettings {
    ElectionSettings {
        lease_duration_ms: 300,
        renew_deadline_ms: 200,
        retry_period_ms: 50,
        ..ElectionSettings::default()
    }
}

pub(crate) fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        election: fast_election_settings(),
        ..CoordinatorConfig::default()
    }
}

/// Polls `condition` every 10ms, panicking after ~5s.
pub(crate) async fn wait_until<F>(
    what: &str,
    condition: F,
) where
    F: Fn() -> bool,
{
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}
