use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::warn;
use tracing::Instrument;

use crate::Error;
use crate::Result;

/// A set of tasks sharing one cancellation scope.
///
/// The first task to return `Err` cancels the scope so its siblings can wind
/// down; [`TaskGroup::wait`] joins every task and reports that first error.
/// Dropping the group without waiting aborts whatever is still running.
#[derive(Debug)]
pub struct TaskGroup {
    name: String,
    token: CancellationToken,
    tasks: JoinSet<Result<()>>,
}

impl TaskGroup {
    /// Creates a group whose scope is a child of `parent`: cancelling the
    /// parent cancels the group, never the other way round.
    pub fn new(
        name: &str,
        parent: &CancellationToken,
    ) -> Self {
        Self {
            name: name.to_string(),
            token: parent.child_token(),
            tasks: JoinSet::new(),
        }
    }

    /// The group's cancellation scope
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn spawn<F>(
        &mut self,
        task: &str,
        fut: F,
    ) where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let token = self.token.clone();
        let group = self.name.clone();
        let task = task.to_string();
        self.tasks.spawn(async move {
            let result = fut.await;
            match &result {
                Ok(()) => debug!(%group, %task, "task finished"),
                Err(e) if e.is_stop_requested() => {
                    debug!(%group, %task, "task requested stop");
                    token.cancel();
                }
                Err(e) => {
                    warn!(%group, %task, "task failed, cancelling group: {:?}", e);
                    token.cancel();
                }
            }
            result
        }
        .in_current_span());
    }

    /// Joins every task. Returns the first error observed, in completion order.
    pub async fn wait(mut self) -> Result<()> {
        let mut first_error: Option<Error> = None;

        while let Some(joined) = self.tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| {
                error!(group = %self.name, "task panicked or was aborted: {:?}", e);
                self.token.cancel();
                Err(Error::TaskFailed {
                    group: self.name.clone(),
                    source: e,
                })
            });

            if let Err(e) = result {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        debug!(group = %self.name, "all tasks joined");
        first_error.map_or(Ok(()), Err)
    }
}
