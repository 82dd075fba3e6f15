//! Command runner abstraction for executing shell commands.
//!
//! `CommandRunner` is the trait that executors use to run local command lines.
//! `ShellRunner` is the production implementation that spawns `sh -c`.
//! `MockRunner` is the test double that records calls and returns preset responses.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::Command;
use tracing::trace;

use super::ExecError;

/// Trait for executing shell command strings.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, cmd: &str) -> Result<String, ExecError>;
}

/// Production runner that spawns `sh -c <cmd>`.
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, cmd: &str) -> Result<String, ExecError> {
        trace!(command = %cmd, "spawning");
        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .output()
            .await
            .map_err(|source| ExecError::Spawn {
                command: cmd.to_string(),
                source,
            })?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(ExecError::Failed {
                command: cmd.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Test-double runner that records commands and returns pre-configured responses.
pub struct MockRunner {
    responses: Mutex<Vec<Result<String, String>>>,
    commands: Mutex<Vec<String>>,
}

impl MockRunner {
    pub fn with_responses(responses: Vec<Result<String, String>>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        MockRunner {
            responses: Mutex::new(reversed),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn new() -> Self {
        MockRunner {
            responses: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn executed_commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, cmd: &str) -> Result<String, ExecError> {
        self.commands.lock().push(cmd.to_string());
        match self.responses.lock().pop() {
            Some(Ok(output)) => Ok(output),
            Some(Err(stderr)) => Err(ExecError::Failed {
                command: cmd.to_string(),
                status: "exit status: 1".into(),
                stderr,
            }),
            None => Ok(String::new()),
        }
    }
}
