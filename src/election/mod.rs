//! Leader election contract consumed by the coordinator.
//!
//! A [`Candidate`] guarantees that at most one process cluster-wide runs
//! between `on_started_leading` and `on_stopped_leading` at any time.
//! [`LeaseCandidate`] is the bundled implementation on top of
//! [`Registry::acquire`](crate::Registry::acquire).

mod lease_candidate;
pub use lease_candidate::*;


use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::ElectionError;
use crate::ElectionSettings;
use crate::Registry;
use crate::Result;

/// Called from the candidate's own task once leadership is acquired.
///
/// Receives the leading scope, cancelled when leadership ends. Must launch
/// leader-only work and return without waiting for it. Cancelling the scope
/// from inside that work resigns leadership.
pub type StartedLeadingFn = Arc<dyn Fn(CancellationToken) -> Result<()> + Send + Sync>;

/// Called after the leading scope is cancelled. The candidate awaits the
/// returned future before releasing the lease, so it must only resolve once
/// all leader-only work has drained.
pub type StoppedLeadingFn = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

#[derive(Clone)]
pub struct LeaderCallbacks {
    pub on_started_leading: StartedLeadingFn,
    pub on_stopped_leading: StoppedLeadingFn,
}

#[derive(Clone)]
pub struct ElectionConfig {
    pub name: String,
    /// Registry key holding the lease
    pub path: String,
    /// Holder identity written into the lease
    pub identity: String,
    pub lease_duration: Duration,
    pub renew_deadline: Duration,
    pub retry_period: Duration,
    pub callbacks: LeaderCallbacks,
}

impl fmt::Debug for ElectionConfig {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ElectionConfig")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("identity", &self.identity)
            .field("lease_duration", &self.lease_duration)
            .field("renew_deadline", &self.renew_deadline)
            .field("retry_period", &self.retry_period)
            .finish_non_exhaustive()
    }
}

impl ElectionConfig {
    pub fn from_settings(
        settings: &ElectionSettings,
        identity: &str,
        callbacks: LeaderCallbacks,
    ) -> Self {
        Self {
            name: settings.name.clone(),
            path: settings.path.clone(),
            identity: identity.to_string(),
            lease_duration: settings.lease_duration(),
            renew_deadline: settings.renew_deadline(),
            retry_period: settings.retry_period(),
            callbacks,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.path.is_empty() || self.identity.is_empty() {
            return Err(ElectionError::InvalidConfig(
                "name, path and identity must be non-empty".into(),
            )
            .into());
        }

        if self.retry_period.is_zero() {
            return Err(ElectionError::InvalidConfig("retry_period must be positive".into()).into());
        }

        if self.lease_duration <= self.renew_deadline + self.retry_period || self.renew_deadline <= self.retry_period {
            return Err(ElectionError::InvalidConfig(format!(
                "expected lease_duration ({:?}) > renew_deadline ({:?}) + retry_period ({:?}) and renew_deadline > retry_period",
                self.lease_duration, self.renew_deadline, self.retry_period
            ))
            .into());
        }

        Ok(())
    }
}

#[async_trait]
pub trait Candidate: Send + Sync {
    /// Participates in the election until `cancel` fires or a callback fails.
    ///
    /// Leadership callbacks are invoked from inside this future.
    async fn run(
        &self,
        cancel: CancellationToken,
    ) -> Result<()>;
}

pub trait CandidateFactory: Send + Sync + 'static {
    fn new_candidate(
        &self,
        config: ElectionConfig,
        registry: Arc<dyn Registry>,
    ) -> Result<Box<dyn Candidate>>;
}
