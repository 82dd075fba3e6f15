//! SSH + docker implementation of `RemoteExecutor`.
//!
//! Commands are composed as shell strings and run through the injected
//! `CommandRunner` (`ShellRunner` in production, `MockRunner` in tests).
//! Container commands are wrapped twice: once for `docker exec ... sh -c`
//! on the host and once for the local shell invoking `ssh`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::runner::CommandRunner;
use super::tmux::shell_escape;
use super::{ExecError, RemoteExecutor};
use crate::config::SshOptions;
use crate::types::fleet::HostConfig;

pub struct SshExecutor {
    runner: Arc<dyn CommandRunner>,
    ssh: SshOptions,
    container_prefix: String,
}

impl SshExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, ssh: SshOptions, container_prefix: &str) -> Self {
        SshExecutor {
            runner,
            ssh,
            container_prefix: container_prefix.to_string(),
        }
    }

    fn container(&self, slot: usize) -> String {
        format!("{}{}", self.container_prefix, slot)
    }

    /// `ssh <args> '<cmd>'`
    pub fn ssh_command(&self, host: &HostConfig, cmd: &str) -> String {
        format!(
            "ssh {} {}",
            host.ssh_base_args(&self.ssh).join(" "),
            shell_escape(cmd)
        )
    }

    /// `docker exec [-d] <container> sh -c '<cmd>'`, to be run on the host.
    pub fn docker_exec_command(&self, slot: usize, cmd: &str, detached: bool) -> String {
        format!(
            "docker exec {}{} sh -c {}",
            if detached { "-d " } else { "" },
            self.container(slot),
            shell_escape(cmd)
        )
    }

    /// `scp <args> <local> user@host:<remote>`
    pub fn scp_command(&self, host: &HostConfig, local: &Path, remote: &str) -> String {
        format!(
            "scp {} {} {}",
            host.scp_base_args(&self.ssh).join(" "),
            shell_escape(&local.to_string_lossy()),
            shell_escape(&format!("{}:{}", host.user_at_host(&self.ssh), remote))
        )
    }

    async fn run_local(&self, cmd: &str) -> Result<String, ExecError> {
        debug!(command = %cmd, "remote call");
        self.runner.run(cmd).await
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, host: &HostConfig, cmd: &str) -> Result<String, ExecError> {
        self.run_local(&self.ssh_command(host, cmd)).await
    }

    async fn exec(&self, host: &HostConfig, slot: usize, cmd: &str) -> Result<String, ExecError> {
        let inner = self.docker_exec_command(slot, cmd, false);
        self.run_local(&self.ssh_command(host, &inner)).await
    }

    async fn exec_detached(
        &self,
        host: &HostConfig,
        slot: usize,
        cmd: &str,
    ) -> Result<String, ExecError> {
        let inner = self.docker_exec_command(slot, cmd, true);
        self.run_local(&self.ssh_command(host, &inner)).await
    }

    async fn upload(&self, host: &HostConfig, local: &Path, remote: &str) -> Result<(), ExecError> {
        self.run_local(&self.scp_command(host, local, remote))
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
        let inner = format!(
            "docker cp {} {}",
            shell_escape(src),
            shell_escape(&format!("{}:{}", self.container(slot), dest_dir))
        );
        self.run_local(&self.ssh_command(host, &inner)).await.map(|_| ())
    }
}
