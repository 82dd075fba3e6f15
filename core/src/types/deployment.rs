//! The deployment request.
//!
//! A `DeploymentSpec` is immutable once a build starts: node count, the
//! network parameter bundle and the named configuration files. A
//! `DeploymentFile` is what the CLI reads from disk, the spec together with
//! the fleet it targets.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DeployError;
use crate::types::fleet::Fleet;


/// Chain parameters shared by every node of the network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkParams {
    pub network_id: u64,
    pub difficulty: u64,
    pub gas_limit: u64,
    #[serde(default)]
    pub homestead_block: u64,
    #[serde(default)]
    pub eip155_block: u64,
    #[serde(default)]
    pub eip158_block: u64,
    /// Balance given to every allocated address, as a decimal string.
    pub init_balance: String,
    pub max_peers: u32,
    /// Number of synthetic funded accounts added to the genesis.
    #[serde(default)]
    pub extra_accounts: usize,
}

impl Default for NetworkParams {
    fn default() -> Self {
        NetworkParams {
            network_id: 15468,
            difficulty: 100_000,
            gas_limit: 4_000_000,
            homestead_block: 0,
            eip155_block: 0,
            eip158_block: 0,
            init_balance: "100000000000000000000".into(),
            max_peers: 1000,
            extra_accounts: 0,
        }
    }
}


/// What to deploy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentSpec {
    pub nodes: usize,
    #[serde(default)]
    pub params: NetworkParams,
    /// Named configuration files, name → local path.
    #[serde(default)]
    pub files: BTreeMap<String, PathBuf>,
}

impl DeploymentSpec {
    pub fn new(nodes: usize, params: NetworkParams) -> Self {
        DeploymentSpec {
            nodes,
            params,
            files: BTreeMap::new(),
        }
    }

    /// Check the spec on its own and against the fleet it targets.
    pub fn validate(&self, fleet: &Fleet) -> Result<(), DeployError> {
        if self.nodes == 0 {
            return Err(DeployError::ConfigInvalid("node count must be positive".into()));
        }
        if fleet.node_count() != self.nodes {
            return Err(DeployError::ConfigInvalid(format!(
                "deployment asks for {} nodes but the fleet has {} slots",
                self.nodes,
                fleet.node_count()
            )));
        }
        if let Some(host) = fleet
            .hosts()
            .iter()
            .find(|h| !h.node_ips.is_empty() && h.gateway.trim().is_empty())
        {
            return Err(DeployError::ConfigInvalid(format!(
                "host {} runs nodes but has no gateway",
                host.addr
            )));
        }
        let balance = &self.params.init_balance;
        if balance.is_empty() || !balance.chars().all(|c| c.is_ascii_digit()) {
            return Err(DeployError::ConfigInvalid(format!(
                "initial balance '{}' is not a decimal number",
                balance
            )));
        }
        Ok(())
    }

    /// Read a named configuration file, or `None` if the spec does not name it.
    pub fn read_file(&self, name: &str) -> Result<Option<String>, DeployError> {
        let Some(path) = self.files.get(name) else {
            return Ok(None);
        };
        std::fs::read_to_string(path)
            .map(Some)
            .map_err(|source| DeployError::Artifact {
                path: path.clone(),
                source,
            })
    }
}


/// A deployment spec and the fleet it targets, as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentFile {
    #[serde(flatten)]
    pub spec: DeploymentSpec,
    pub hosts: Fleet,
}

/// Load a deployment file. Relative file paths are resolved against the
/// directory holding the deployment file.
pub fn load(path: &Path) -> Result<DeploymentFile, DeployError> {
    let content = std::fs::read_to_string(path).map_err(|source| DeployError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut file = parse(&content)?;
    if let Some(base) = path.parent() {
        for p in file.spec.files.values_mut() {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }
    Ok(file)
}

/// Parse and validate a deployment file from a YAML string.
pub fn parse(content: &str) -> Result<DeploymentFile, DeployError> {
    let file: DeploymentFile = serde_yaml::from_str(content)?;
    file.spec.validate(&file.hosts)?;
    Ok(file)
}
