use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::sleep;
use tokio::time::sleep_until;
use tokio::time::timeout_at;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::Candidate;
use super::CandidateFactory;
use super::ElectionConfig;
use crate::constants::ELECTION_JITTER_FACTOR;
use crate::Registry;
use crate::Result;

/// Why a term ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermEnd {
    /// The run token was cancelled
    Cancelled,
    /// The leading token was cancelled by leader-only work
    Resigned,
    /// The lease moved elsewhere or could not be renewed in time
    Lost,
}

/// Lease-based candidate.
///
/// Campaigns by acquiring `config.path` through the registry and keeps the
/// lease by re-acquiring it every `retry_period`. Each renewal is timed from
/// the start of the last successful attempt, which is no later than the
/// moment the registry extended the lease. A leader that has not renewed by
/// `last attempt start + renew_deadline` steps down at that instant, with
/// in-flight attempts cut off at the same deadline.
///
/// Step-down (cancelling `leading` and running `on_stopped_leading`) must
/// finish within `lease_duration - renew_deadline`, which validation keeps
/// longer than `retry_period`. Only then does the lease expire for rivals.
pub struct LeaseCandidate {
    config: ElectionConfig,
    registry: Arc<dyn Registry>,
}

impl LeaseCandidate {
    pub fn new(
        config: ElectionConfig,
        registry: Arc<dyn Registry>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, registry })
    }

    /// Campaigns until the lease is ours or `cancel` fires (`None`).
    ///
    /// Returns the start of the winning attempt.
    async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> Option<Instant> {
        loop {
            let attempt_start = Instant::now();
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                result = self
                    .registry
                    .acquire(&self.config.path, &self.config.identity, self.config.lease_duration) => result,
            };

            match attempt {
                Ok(true) => return Some(attempt_start),
                Ok(false) => trace!(identity = %self.config.identity, "lease held by another candidate"),
                Err(e) => warn!(identity = %self.config.identity, "lease acquire failed: {:?}", e),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = sleep(self.jittered_retry_period()) => {}
            }
        }
    }

    /// Renews the lease until the term ends.
    ///
    /// `renewed_at` is the start of the attempt that won or last renewed the
    /// lease.
    async fn renew(
        &self,
        cancel: &CancellationToken,
        leading: &CancellationToken,
        mut renewed_at: Instant,
    ) -> TermEnd {
        loop {
            let deadline = renewed_at + self.config.renew_deadline;
            let next_attempt = (Instant::now() + self.config.retry_period).min(deadline);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return TermEnd::Cancelled,
                _ = leading.cancelled() => return TermEnd::Resigned,
                _ = sleep_until(next_attempt) => {}
            }

            if Instant::now() >= deadline {
                return self.give_up();
            }

            let attempt_start = Instant::now();
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return TermEnd::Cancelled,
                _ = leading.cancelled() => return TermEnd::Resigned,
                attempt = timeout_at(
                    deadline,
                    self.registry
                        .acquire(&self.config.path, &self.config.identity, self.config.lease_duration),
                ) => attempt,
            };

            match attempt {
                Ok(Ok(true)) => {
                    trace!(identity = %self.config.identity, "lease renewed");
                    renewed_at = attempt_start;
                }
                Ok(Ok(false)) => {
                    warn!(identity = %self.config.identity, "lease taken over by another candidate");
                    return TermEnd::Lost;
                }
                Ok(Err(e)) => warn!(identity = %self.config.identity, "lease renewal failed: {:?}", e),
                Err(_) => {
                    warn!(identity = %self.config.identity, "lease renewal cut off at deadline");
                    return self.give_up();
                }
            }
        }
    }

    fn give_up(&self) -> TermEnd {
        warn!(
            identity = %self.config.identity,
            "no renewal within {:?}, giving up leadership",
            self.config.renew_deadline
        );
        TermEnd::Lost
    }

    async fn release(&self) {
        match self.registry.release(&self.config.path, &self.config.identity).await {
            Ok(released) => debug!(identity = %self.config.identity, released, "lease released"),
            Err(e) => warn!(identity = %self.config.identity, "lease release failed: {:?}", e),
        }
    }

    fn jittered_retry_period(&self) -> Duration {
        let factor = 1.0 + rand::thread_rng().gen_range(0.0..ELECTION_JITTER_FACTOR);
        self.config.retry_period.mul_f64(factor)
    }
}

#[async_trait]
impl Candidate for LeaseCandidate {
    async fn run(
        &self,
        cancel: CancellationToken,
    ) -> Result<()> {
        info!(
            name = %self.config.name,
            path = %self.config.path,
            identity = %self.config.identity,
            "joining leader election"
        );

        loop {
            let Some(acquired_at) = self.acquire(&cancel).await else {
                debug!(identity = %self.config.identity, "election cancelled while campaigning");
                return Ok(());
            };

            info!(identity = %self.config.identity, "lease acquired");
            let leading = cancel.child_token();
            if let Err(e) = (self.config.callbacks.on_started_leading)(leading.clone()) {
                error!(identity = %self.config.identity, "on_started_leading failed: {:?}", e);
                leading.cancel();
                self.release().await;
                return Err(e);
            }

            let end = self.renew(&cancel, &leading, acquired_at).await;
            info!(identity = %self.config.identity, ?end, "leadership term ended");

            leading.cancel();
            let stepped_down = (self.config.callbacks.on_stopped_leading)().await;
            self.release().await;

            if let Err(e) = stepped_down {
                error!(identity = %self.config.identity, "on_stopped_leading failed: {:?}", e);
                return Err(e);
            }

            if end == TermEnd::Cancelled || cancel.is_cancelled() {
                return Ok(());
            }
        }
    }
}

/// Builds a [`LeaseCandidate`] for every coordinator start
#[derive(Debug, Default, Clone, Copy)]
pub struct LeaseCandidateFactory;

impl CandidateFactory for LeaseCandidateFactory {
    fn new_candidate(
        &self,
        config: ElectionConfig,
        registry: Arc<dyn Registry>,
    ) -> Result<Box<dyn Candidate>> {
        Ok(Box::new(LeaseCandidate::new(config, registry)?))
    }
}
