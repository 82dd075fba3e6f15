//! Progress and error tracking for one build.
//!
//! `BuildState` is shared by the control loop and every fanned-out task. The
//! counters are atomics and the error list is append-only, so any number of
//! tasks can report at once. Errors are only acted on at phase barriers.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::DeployError;


// ---------------------------------------------------------------------------
// TaskError
// ---------------------------------------------------------------------------

/// A failure recorded by a fanned-out task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskError {
    /// Stage label current when the error was reported.
    pub stage: String,
    /// Node index the task was working on, if it was per node.
    pub node: Option<usize>,
    pub message: String,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some(node) => write!(f, "node {}: {}", node, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}


// ---------------------------------------------------------------------------
// BuildStatus
// ---------------------------------------------------------------------------

/// Point-in-time view of a build, for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildStatus {
    pub stage: String,
    pub completed: usize,
    pub total: usize,
    pub errors: usize,
}


// ---------------------------------------------------------------------------
// BuildState
// ---------------------------------------------------------------------------

pub struct BuildState {
    total: AtomicUsize,
    completed: AtomicUsize,
    errors: Mutex<Vec<TaskError>>,
    stage: RwLock<String>,
}

impl BuildState {
    pub fn new() -> Self {
        BuildState {
            total: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            errors: Mutex::new(Vec::new()),
            stage: RwLock::new(String::new()),
        }
    }

    /// Declare how many progress increments a successful build makes.
    pub fn set_total_steps(&self, n: usize) {
        self.total.store(n, Ordering::SeqCst);
    }

    pub fn set_stage(&self, name: &str) {
        info!(stage = %name, "build stage");
        *self.stage.write() = name.to_string();
    }

    pub fn stage(&self) -> String {
        self.stage.read().clone()
    }

    /// Count one completed step. Returns the new count.
    pub fn increment_progress(&self) -> usize {
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Record a failure without stopping the caller's siblings.
    pub fn report_error(&self, node: Option<usize>, message: impl Into<String>) {
        let err = TaskError {
            stage: self.stage(),
            node,
            message: message.into(),
        };
        warn!(stage = %err.stage, node = ?err.node, error = %err.message, "task failed");
        self.errors.lock().push(err);
    }

    pub fn is_error_free(&self) -> bool {
        self.errors.lock().is_empty()
    }

    /// Every recorded error, in report order.
    pub fn errors(&self) -> Vec<TaskError> {
        self.errors.lock().clone()
    }

    /// The first recorded error with a count of all others, or `None` if the
    /// build is error free.
    pub fn first_error(&self) -> Option<DeployError> {
        let errors = self.errors.lock();
        errors.first().map(|first| DeployError::Reported {
            stage: first.stage.clone(),
            count: errors.len(),
            first: first.clone(),
        })
    }

    /// Fail with the representative error if anything was reported.
    pub fn checkpoint(&self) -> Result<(), DeployError> {
        match self.first_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn status(&self) -> BuildStatus {
        BuildStatus {
            stage: self.stage(),
            completed: self.completed(),
            total: self.total(),
            errors: self.errors.lock().len(),
        }
    }
}

impl Default for BuildState {
    fn default() -> Self {
        Self::new()
    }
}
