//! Bounded fan-out of per-node work within one phase.
//!
//! `FanOut` spawns one task per node, each holding a single limiter unit for
//! its whole body. Tasks own nothing shared: each returns its value with its
//! node index and `join` is the only writer of the result slots. A failing
//! task is reported to the `BuildState` and leaves its slot empty; its
//! siblings carry on.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;

use super::limiter::ConcurrencyLimiter;
use super::state::BuildState;
use crate::error::DeployError;

pub struct FanOut<T> {
    limiter: ConcurrencyLimiter,
    state: Arc<BuildState>,
    tasks: JoinSet<(usize, Option<T>)>,
    slots: usize,
}

impl<T: Send + 'static> FanOut<T> {
    pub fn new(limiter: &ConcurrencyLimiter, state: &Arc<BuildState>) -> Self {
        FanOut {
            limiter: limiter.clone(),
            state: Arc::clone(state),
            tasks: JoinSet::new(),
            slots: 0,
        }
    }

    /// Wait for a free unit, then start `work` for node `index`.
    pub async fn spawn<F>(&mut self, index: usize, work: F) -> Result<(), DeployError>
    where
        F: Future<Output = Result<T, DeployError>> + Send + 'static,
    {
        let permit = self.limiter.acquire(1).await?;
        let state = Arc::clone(&self.state);
        self.tasks.spawn(async move {
            let slot = match work.await {
                Ok(value) => Some(value),
                Err(err) => {
                    state.report_error(Some(index), err.to_string());
                    None
                }
            };
            permit.release();
            (index, slot)
        });
        self.slots = self.slots.max(index + 1);
        Ok(())
    }

    /// Barrier: wait for every task, then hand back the slots in index order.
    /// Slots of failed tasks are `None`.
    pub async fn join(mut self) -> Result<Vec<Option<T>>, DeployError> {
        self.limiter.barrier().await?;
        let mut slots: Vec<Option<T>> = (0..self.slots).map(|_| None).collect();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((index, value)) => slots[index] = value,
                Err(err) => self.state.report_error(None, format!("task aborted: {}", err)),
            }
        }
        Ok(slots)
    }
}

/// Unwrap joined slots once the barrier checkpoint has passed.
pub fn complete<T>(slots: Vec<Option<T>>) -> Result<Vec<T>, DeployError> {
    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.ok_or(DeployError::MissingResult(i)))
        .collect()
}
