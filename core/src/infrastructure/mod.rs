//! Infrastructure backends for reaching the fleet.
//!
//! Provides the `RemoteExecutor` trait and its implementations: `SshExecutor`
//! (production, composes ssh/scp/docker command lines and hands them to a
//! `CommandRunner`) and `MockExecutor` (testing). `tmux` builds the detached
//! session commands node processes run inside.

pub mod mock;
pub mod runner;
pub mod ssh;
pub mod tmux;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::fleet::HostConfig;

pub use mock::{MockExecutor, RemoteCall};
pub use runner::{CommandRunner, MockRunner, ShellRunner};
pub use ssh::SshExecutor;


// ---------------------------------------------------------------------------
// ExecError
// ---------------------------------------------------------------------------

/// Failure of a single command or copy.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command could not be started at all.
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully.
    #[error("`{command}` failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}


// ---------------------------------------------------------------------------
// RemoteExecutor
// ---------------------------------------------------------------------------

/// Runs commands and copies files against a host, or a container slot on it.
///
/// Slots are the container index on the host, the same `slot` carried by
/// `NodeRef`. Every method is attempted exactly once; retries are the
/// caller's business and the pipeline never makes any.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a command directly on the host.
    async fn run(&self, host: &HostConfig, cmd: &str) -> Result<String, ExecError>;

    /// Run a command inside a container and wait for its output.
    async fn exec(&self, host: &HostConfig, slot: usize, cmd: &str) -> Result<String, ExecError>;

    /// Start a command inside a container without waiting for it.
    async fn exec_detached(
        &self,
        host: &HostConfig,
        slot: usize,
        cmd: &str,
    ) -> Result<String, ExecError>;

    /// Copy a local file to a path on the host.
    async fn upload(&self, host: &HostConfig, local: &Path, remote: &str) -> Result<(), ExecError>;

    /// Copy a file already on the host into a container directory.
    async fn copy_into(
        &self,
        host: &HostConfig,
        slot: usize,
        src: &str,
        dest_dir: &str,
    ) -> Result<(), ExecError>;
}
