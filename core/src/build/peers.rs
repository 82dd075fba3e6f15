//! Peer identity discovery.
//!
//! Every node is initialised from the distributed genesis and then asked for
//! its own identity URI. Nodes report an unspecified bind address, so the
//! address segment is replaced by the node's IP before the identity goes
//! into the static peer list. Any failure here ends the build.

use tracing::{debug, info};

use super::artifact::{LocalArtifact, GENESIS_FILE, PEER_LIST_FILE};
use super::parse::{Grammar, PeerIdentityUri};
use super::BuildContext;
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::types::deployment::NetworkParams;
use crate::types::fleet::Fleet;
use crate::types::peer::PeerIdentity;

pub struct PeerAddressResolver {
    ctx: BuildContext,
}

impl PeerAddressResolver {
    pub fn new(ctx: BuildContext) -> Self {
        PeerAddressResolver { ctx }
    }

    /// Initialise each node and collect its reachable identity, in node order.
    pub async fn resolve(
        &self,
        fleet: &Fleet,
        params: &NetworkParams,
    ) -> Result<Vec<PeerIdentity>, DeployError> {
        let init = init_command(&self.ctx.config, params);
        let query = identity_command(&self.ctx.config, params);
        let mut peers = Vec::with_capacity(fleet.node_count());

        for node in fleet.nodes() {
            let host = fleet.host(node.host);
            let permit = self.ctx.limiter.acquire(1).await?;
            self.ctx.executor.exec(host, node.slot, &init).await?;
            let output = self.ctx.executor.exec(host, node.slot, &query).await?;
            permit.release();

            let reported = PeerIdentityUri::extract(&output)?;
            if !reported.is_placeholder() {
                debug!(node = node.index, address = %reported.address, "node reported a concrete address");
            }
            let identity = reported.with_address(&node.ip);
            debug!(node = node.index, identity = %identity, "peer resolved");
            peers.push(identity);
            self.ctx.state.increment_progress();
        }
        Ok(peers)
    }

    /// Write the static peer list artifact, a JSON array of identity URIs.
    pub fn write_peer_list(
        &self,
        peers: &[PeerIdentity],
    ) -> Result<(Vec<String>, LocalArtifact), DeployError> {
        let list: Vec<String> = peers.iter().map(ToString::to_string).collect();
        let json = serde_json::to_string_pretty(&list).map_err(|source| DeployError::Encode {
            what: "peer list",
            source,
        })?;
        let artifact = LocalArtifact::write(&self.ctx.config.artifact_dir, PEER_LIST_FILE, &json)?;
        info!(peers = list.len(), "static peer list written");
        self.ctx.state.increment_progress();
        Ok((list, artifact))
    }
}

/// `geth --datadir <dir>/ --networkid <id> init <dir>/CustomGenesis.json`
pub fn init_command(config: &DeployConfig, params: &NetworkParams) -> String {
    format!(
        "geth --datadir {}/ --networkid {} init {}",
        config.node_dir.trim_end_matches('/'),
        params.network_id,
        config.node_path(GENESIS_FILE)
    )
}

/// Starts a console just long enough to print the node's identity URI.
pub fn identity_command(config: &DeployConfig, params: &NetworkParams) -> String {
    format!(
        "bash -c 'echo -e \"admin.nodeInfo.enode\\nexit\\n\" | geth --rpc --datadir {}/ --networkid {} console'",
        config.node_dir.trim_end_matches('/'),
        params.network_id
    )
}
