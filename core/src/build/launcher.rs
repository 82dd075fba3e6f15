//! Artifact distribution and node start-up.
//!
//! Artifacts are uploaded once per host into the staging directory and then
//! copied into each container from there. Every node imports the keystore of
//! every other node so it can unlock the whole allocation, and finally runs
//! its node process inside a detached tmux session.

use tracing::{debug, info};

use super::artifact::LocalArtifact;
use super::phase::{complete, FanOut};
use super::{BuildContext, LaunchHandle};
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::infrastructure::tmux::TmuxCommandBuilder;
use crate::types::deployment::NetworkParams;
use crate::types::fleet::{Fleet, HostConfig, NodeRef};
use crate::types::wallet::{unlock_list, Wallet};

/// Tmux session the node process runs in.
pub const NODE_SESSION: &str = "whiteblock";

/// Methods the RPC endpoint of every node exposes.
pub const RPC_API: &str = "web3,db,eth,net,personal,miner,txpool";

pub struct NodeLauncher {
    ctx: BuildContext,
}

impl NodeLauncher {
    pub fn new(ctx: BuildContext) -> Self {
        NodeLauncher { ctx }
    }

    /// Stage `artifact` on every host and copy it into every container of
    /// that host, creating the node directory first. One progress step per
    /// host. The first failure ends the build.
    pub async fn distribute_secrets(
        &self,
        fleet: &Fleet,
        artifact: &LocalArtifact,
    ) -> Result<(), DeployError> {
        let config = &self.ctx.config;
        let staged = config.staged(artifact.name());
        let mkdir = format!("mkdir -p {}", config.node_dir);
        for host in fleet.hosts() {
            self.upload(host, artifact).await?;
            for slot in 0..host.node_ips.len() {
                self.ctx.executor.exec(host, slot, &mkdir).await?;
                self.ctx
                    .executor
                    .copy_into(host, slot, &staged, &node_dir(config))
                    .await?;
            }
            self.ctx.state.increment_progress();
        }
        Ok(())
    }

    /// Stage the genesis artifact on every host, then for every node copy it
    /// into the node directory and import every other node's keystore.
    /// One progress step per node.
    pub async fn bootstrap(
        &self,
        fleet: &Fleet,
        genesis: &LocalArtifact,
        wallets: &[Wallet],
    ) -> Result<(), DeployError> {
        for host in fleet.hosts() {
            self.upload(host, genesis).await?;
        }

        let staged = self.ctx.config.staged(genesis.name());
        let mut fan = FanOut::new(&self.ctx.limiter, &self.ctx.state);
        for node in fleet.nodes() {
            let ctx = self.ctx.clone();
            let host = fleet.host(node.host).clone();
            let imports: Vec<(usize, String)> = wallets
                .iter()
                .enumerate()
                .filter(|(k, _)| *k != node.index)
                .map(|(k, w)| (k, w.raw.clone()))
                .collect();
            fan.spawn(node.index, bootstrap_one(ctx, host, node, staged.clone(), imports))
                .await?;
        }
        let slots = fan.join().await?;
        self.ctx.state.checkpoint()?;
        complete(slots).map(|_| ())
    }

    /// Stage the peer list on every host, once per host.
    pub async fn distribute_peer_list(
        &self,
        fleet: &Fleet,
        peer_list: &LocalArtifact,
    ) -> Result<(), DeployError> {
        for host in fleet.hosts() {
            self.upload(host, peer_list).await?;
            self.ctx.state.increment_progress();
        }
        Ok(())
    }

    /// Copy the staged peer list into each node and start its process.
    pub async fn launch(
        &self,
        fleet: &Fleet,
        params: &NetworkParams,
        peer_list: &LocalArtifact,
        wallets: &[Wallet],
    ) -> Result<Vec<LaunchHandle>, DeployError> {
        let unlock = unlock_list(wallets);
        let staged = self.ctx.config.staged(peer_list.name());
        let mut fan = FanOut::new(&self.ctx.limiter, &self.ctx.state);
        for node in fleet.nodes() {
            let ctx = self.ctx.clone();
            let host = fleet.host(node.host).clone();
            let etherbase = wallets
                .get(node.index)
                .ok_or(DeployError::MissingResult(node.index))?;
            let command = node_command(&ctx.config, params, &node.ip, &unlock, &etherbase.address);
            let staged = staged.clone();
            fan.spawn(node.index, launch_one(ctx, host, node, staged, command))
                .await?;
        }
        let slots = fan.join().await?;
        self.ctx.state.checkpoint()?;
        complete(slots)
    }

    async fn upload(&self, host: &HostConfig, artifact: &LocalArtifact) -> Result<(), DeployError> {
        let remote = self.ctx.config.staged(artifact.name());
        self.ctx.executor.upload(host, artifact.path(), &remote).await?;
        debug!(host = %host.addr, file = artifact.name(), "artifact staged");
        Ok(())
    }
}

async fn bootstrap_one(
    ctx: BuildContext,
    host: HostConfig,
    node: NodeRef,
    staged: String,
    imports: Vec<(usize, String)>,
) -> Result<(), DeployError> {
    ctx.executor
        .copy_into(&host, node.slot, &staged, &node_dir(&ctx.config))
        .await?;
    for (k, raw) in &imports {
        let cmd = import_keystore_command(&ctx.config, *k, raw);
        ctx.executor.exec(&host, node.slot, &cmd).await?;
    }
    ctx.state.increment_progress();
    debug!(node = node.index, imported = imports.len(), "node bootstrapped");
    Ok(())
}

async fn launch_one(
    ctx: BuildContext,
    host: HostConfig,
    node: NodeRef,
    staged: String,
    command: String,
) -> Result<LaunchHandle, DeployError> {
    let tmux = TmuxCommandBuilder::new();
    ctx.executor
        .copy_into(&host, node.slot, &staged, &node_dir(&ctx.config))
        .await?;
    ctx.executor
        .exec_detached(&host, node.slot, &tmux.new_session(NODE_SESSION))
        .await?;
    ctx.executor
        .exec_detached(&host, node.slot, &tmux.send_keys(NODE_SESSION, &command))
        .await?;
    ctx.state.increment_progress();
    info!(node = node.index, host = %host.addr, ip = %node.ip, "node started");
    Ok(LaunchHandle {
        node: node.index,
        host: host.addr.clone(),
        container: ctx.config.container_name(node.slot),
        session: NODE_SESSION.to_string(),
    })
}

/// Node directory with a trailing slash, the form `docker cp` expects.
fn node_dir(config: &DeployConfig) -> String {
    format!("{}/", config.node_dir.trim_end_matches('/'))
}

/// Append a keystore to `<dir>/keystore/account<k>`. `raw` is already
/// escaped for a double-quoted string.
pub fn import_keystore_command(config: &DeployConfig, k: usize, raw: &str) -> String {
    format!(
        "bash -c 'echo \"{}\">>{}/account{}'",
        raw,
        config.node_path("keystore"),
        k
    )
}

/// The long-running node command line for one node.
pub fn node_command(
    config: &DeployConfig,
    params: &NetworkParams,
    ip: &str,
    unlock: &str,
    etherbase: &str,
) -> String {
    format!(
        "geth --datadir {} --maxpeers {} --networkid {} --rpc --rpcaddr {} \
         --rpcapi \"{}\" --rpccorsdomain \"0.0.0.0\" --mine --unlock=\"{}\" \
         --password {} --etherbase {} console 2>&1 | tee output.log",
        node_dir(config),
        params.max_peers,
        params.network_id,
        ip,
        RPC_API,
        unlock,
        config.node_path("passwd"),
        etherbase
    )
}
