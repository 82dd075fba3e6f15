//! Mock remote executor for testing.
//!
//! Records every call in order and answers from pre-configured rules, making
//! it easy to write deterministic tests for the pipeline. Uploaded files are
//! read at call time so tests can inspect artifacts that the build deletes
//! before returning.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ExecError, RemoteExecutor};
use crate::types::fleet::HostConfig;


// ---------------------------------------------------------------------------
// RemoteCall
// ---------------------------------------------------------------------------

/// One call made against the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Run {
        host: String,
        cmd: String,
    },
    Exec {
        host: String,
        slot: usize,
        cmd: String,
    },
    ExecDetached {
        host: String,
        slot: usize,
        cmd: String,
    },
    Upload {
        host: String,
        local: PathBuf,
        remote: String,
        /// Content of the local file when the upload was made.
        content: Option<String>,
    },
    CopyInto {
        host: String,
        slot: usize,
        src: String,
        dest_dir: String,
    },
}

impl RemoteCall {
    pub fn host(&self) -> &str {
        match self {
            RemoteCall::Run { host, .. }
            | RemoteCall::Exec { host, .. }
            | RemoteCall::ExecDetached { host, .. }
            | RemoteCall::Upload { host, .. }
            | RemoteCall::CopyInto { host, .. } => host,
        }
    }

    pub fn slot(&self) -> Option<usize> {
        match self {
            RemoteCall::Exec { slot, .. }
            | RemoteCall::ExecDetached { slot, .. }
            | RemoteCall::CopyInto { slot, .. } => Some(*slot),
            RemoteCall::Run { .. } | RemoteCall::Upload { .. } => None,
        }
    }

    /// Text that rules are matched against.
    pub fn text(&self) -> String {
        match self {
            RemoteCall::Run { cmd, .. }
            | RemoteCall::Exec { cmd, .. }
            | RemoteCall::ExecDetached { cmd, .. } => cmd.clone(),
            RemoteCall::Upload { local, remote, .. } => {
                format!("upload {} {}", local.display(), remote)
            }
            RemoteCall::CopyInto { src, dest_dir, .. } => format!("cp {} {}", src, dest_dir),
        }
    }
}


// ---------------------------------------------------------------------------
// MockExecutor
// ---------------------------------------------------------------------------

struct Rule {
    host: Option<String>,
    slot: Option<usize>,
    needle: String,
    response: Result<String, String>,
}

impl Rule {
    fn matches(&self, call: &RemoteCall, text: &str) -> bool {
        self.host.as_deref().map_or(true, |h| h == call.host())
            && self.slot.map_or(true, |s| Some(s) == call.slot())
            && text.contains(&self.needle)
    }

    fn specificity(&self) -> u8 {
        self.host.is_some() as u8 + self.slot.is_some() as u8
    }
}

/// A test double that records calls and serves pre-configured responses.
///
/// A call is answered by the most specific matching rule, the one added
/// last among equals, so later rules override earlier ones. Calls no rule matches succeed with empty output.
pub struct MockExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<RemoteCall>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    /// Every call takes `delay` to complete, so concurrent calls overlap.
    pub fn with_delay(delay: Duration) -> Self {
        MockExecutor {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn add_rule(&self, host: Option<&str>, slot: Option<usize>, needle: &str, response: Result<String, String>) {
        self.rules.lock().push(Rule {
            host: host.map(str::to_string),
            slot,
            needle: needle.to_string(),
            response,
        });
    }

    /// Answer any call containing `needle` with `output`.
    pub fn respond(&self, needle: &str, output: &str) {
        self.add_rule(None, None, needle, Ok(output.to_string()));
    }

    /// Answer calls containing `needle` on one container with `output`.
    pub fn respond_on(&self, host: &str, slot: usize, needle: &str, output: &str) {
        self.add_rule(Some(host), Some(slot), needle, Ok(output.to_string()));
    }

    /// Fail any call containing `needle`.
    pub fn fail(&self, needle: &str, stderr: &str) {
        self.add_rule(None, None, needle, Err(stderr.to_string()));
    }

    /// Fail calls containing `needle` on one container.
    pub fn fail_on(&self, host: &str, slot: usize, needle: &str, stderr: &str) {
        self.add_rule(Some(host), Some(slot), needle, Err(stderr.to_string()));
    }

    /// All calls made so far, in the order they started.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Matching text of every call, in order.
    pub fn texts(&self) -> Vec<String> {
        self.calls.lock().iter().map(RemoteCall::text).collect()
    }

    /// Index of the first call whose text contains `needle`.
    pub fn first_position(&self, needle: &str) -> Option<usize> {
        self.texts().iter().position(|t| t.contains(needle))
    }

    /// Index of the last call whose text contains `needle`.
    pub fn last_position(&self, needle: &str) -> Option<usize> {
        self.texts().iter().rposition(|t| t.contains(needle))
    }

    /// Highest number of calls that were ever in progress at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn handle(&self, call: RemoteCall) -> Result<String, ExecError> {
        let text = call.text();
        let response = {
            let rules = self.rules.lock();
            rules
                .iter()
                .filter(|r| r.matches(&call, &text))
                .max_by_key(|r| r.specificity())
                .map(|r| r.response.clone())
        };
        self.calls.lock().push(call);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match response {
            None => Ok(String::new()),
            Some(Ok(output)) => Ok(output),
            Some(Err(stderr)) => Err(ExecError::Failed {
                command: text,
                status: "exit status: 1".into(),
                stderr,
            }),
        }
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteExecutor for MockExecutor {
    async fn run(&self, host: &HostConfig, cmd: &str) -> Result<String, ExecError> {
        self.handle(RemoteCall::Run {
            host: host.addr.clone(),
            cmd: cmd.to_string(),
        })
        .await
    }

    async fn exec(&self, host: &HostConfig, slot: usize, cmd: &str) -> Result<String, ExecError> {
        self.handle(RemoteCall::Exec {
            host: host.addr.clone(),
            slot,
            cmd: cmd.to_string(),
        })
        .await
    }

    async fn exec_detached(
        &self,
        host: &HostConfig,
        slot: usize,
        cmd: &str,
    ) -> Result<String, ExecError> {
        self.handle(RemoteCall::ExecDetached {
            host: host.addr.clone(),
            slot,
            cmd: cmd.to_string(),
        })
        .await
    }

    async fn upload(&self, host: &HostConfig, local: &Path, remote: &str) -> Result<(), ExecError> {
        self.handle(RemoteCall::Upload {
            host: host.addr.clone(),
            local: local.to_path_buf(),
            remote: remote.to_string(),
            content: std::fs::read_to_string(local).ok(),
        })
        .await
        .map(|_| ())
    }

    async fn copy_into(
        &self,
        host: &HostConfig,
        slot: usize,
        src: &str,
        dest_dir: &str,
    ) -> Result<(), ExecError> {
        self.handle(RemoteCall::CopyInto {
            host: host.addr.clone(),
            slot,
            src: src.to_string(),
            dest_dir: dest_dir.to_string(),
        })
        .await
        .map(|_| ())
    }
}
