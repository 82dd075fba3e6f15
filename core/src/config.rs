//! Deployment tool configuration.
//!
//! `DeployConfig` is the explicit configuration value handed to the
//! orchestrator: concurrency capacity, naming prefixes, remote layout, SSH
//! coordinates and dashboard settings. Every field has a default, so an empty
//! YAML file is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DeployError;

/// Default bound on in-flight remote operations.
pub const DEFAULT_THREAD_LIMIT: u32 = 10;

/// Port the network dashboard listens on.
pub const DASHBOARD_PORT: u16 = 3338;


// ---------------------------------------------------------------------------
// DeployConfig
// ---------------------------------------------------------------------------

/// Top-level configuration for a deployment run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeployConfig {
    /// Maximum number of remote operations in flight at once.
    pub thread_limit: u32,

    /// Prefix of node instance names reported to the dashboard.
    pub node_prefix: String,

    /// Container name for slot `j` is `{container_prefix}{j}`.
    pub container_prefix: String,

    /// Container on the first host that runs the dashboard.
    pub service_container: String,

    /// Staging directory on each host for uploaded artifacts.
    pub remote_staging_dir: String,

    /// Node working directory inside each container.
    pub node_dir: String,

    /// Unlock password written once per node, also used as the dashboard secret.
    pub password: String,

    /// Local directory for transient artifacts.
    pub artifact_dir: PathBuf,

    pub ssh: SshOptions,

    pub stats: StatsConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        DeployConfig {
            thread_limit: DEFAULT_THREAD_LIMIT,
            node_prefix: "node".into(),
            container_prefix: "whiteblock-node".into(),
            service_container: "wb_service0".into(),
            remote_staging_dir: "/home/appo".into(),
            node_dir: "/geth".into(),
            password: "second".into(),
            artifact_dir: PathBuf::from("."),
            ssh: SshOptions::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl DeployConfig {
    /// Container name for a slot.
    pub fn container_name(&self, slot: usize) -> String {
        format!("{}{}", self.container_prefix, slot)
    }

    /// Path of a staged artifact on a host.
    pub fn staged(&self, file: &str) -> String {
        format!("{}/{}", self.remote_staging_dir.trim_end_matches('/'), file)
    }

    /// Path of a file inside the node directory.
    pub fn node_path(&self, file: &str) -> String {
        format!("{}/{}", self.node_dir.trim_end_matches('/'), file)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.thread_limit == 0 {
            return Err(DeployError::ConfigInvalid(
                "thread_limit must be greater than zero".into(),
            ));
        }
        if self.node_dir.trim().is_empty() {
            return Err(DeployError::ConfigInvalid("node_dir must not be empty".into()));
        }
        if self.password.contains(['\n', '\'', '"']) {
            return Err(DeployError::ConfigInvalid(
                "password must not contain quotes or newlines".into(),
            ));
        }
        if !self
            .node_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(DeployError::ConfigInvalid(format!(
                "node_prefix '{}' may only contain letters, digits, '-', '_' and '.'",
                self.node_prefix
            )));
        }
        Ok(())
    }
}


// ---------------------------------------------------------------------------
// SshOptions
// ---------------------------------------------------------------------------

/// SSH coordinates shared by every host in the fleet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SshOptions {
    pub user: String,
    pub port: u16,
    /// Path to a private key, if not using the agent/default.
    pub identity: Option<String>,
}

impl Default for SshOptions {
    fn default() -> Self {
        SshOptions {
            user: "appo".into(),
            port: 22,
            identity: None,
        }
    }
}


// ---------------------------------------------------------------------------
// StatsConfig
// ---------------------------------------------------------------------------

/// Dashboard and reporting agent layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatsConfig {
    pub port: u16,
    /// Dashboard checkout inside the service container.
    pub dashboard_dir: String,
    /// Reporting agent checkout inside each node container.
    pub agent_dir: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig {
            port: DASHBOARD_PORT,
            dashboard_dir: "/eth-netstats".into(),
            agent_dir: "/eth-net-intelligence-api".into(),
        }
    }
}


// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and validate a configuration from a YAML file.
pub fn load(path: &Path) -> Result<DeployConfig, DeployError> {
    let content = std::fs::read_to_string(path).map_err(|source| DeployError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content)
}

/// Parse and validate a configuration from a YAML string.
pub fn parse(content: &str) -> Result<DeployConfig, DeployError> {
    let config: DeployConfig = if content.trim().is_empty() {
        DeployConfig::default()
    } else {
        serde_yaml::from_str(content)?
    };
    config.validate()?;
    Ok(config)
}
