//! The deployment pipeline.
//!
//! `Orchestrator` drives an ordered sequence of phases over the fleet:
//! secrets, wallets, genesis, bootstrap, peer resolution, launch and stats.
//! Within a phase per-node work fans out through the `ConcurrencyLimiter`
//! and joins at a barrier before the next phase starts. Every phase reports
//! into the shared `BuildState`.

pub mod artifact;
pub mod genesis;
pub mod launcher;
pub mod limiter;
pub mod orchestrator;
pub mod parse;
pub mod peers;
pub mod phase;
pub mod state;
pub mod stats;
pub mod wallet;

use std::sync::Arc;

use serde::Serialize;

use crate::config::DeployConfig;
use crate::infrastructure::RemoteExecutor;

pub use genesis::{GenesisBuilder, GenesisDocument};
pub use launcher::NodeLauncher;
pub use limiter::ConcurrencyLimiter;
pub use orchestrator::Orchestrator;
pub use peers::PeerAddressResolver;
pub use state::{BuildState, BuildStatus, TaskError};
pub use stats::StatsRegistrar;
pub use wallet::WalletProvisioner;


/// What every component needs to reach the fleet and report progress.
#[derive(Clone)]
pub struct BuildContext {
    pub config: Arc<DeployConfig>,
    pub executor: Arc<dyn RemoteExecutor>,
    pub state: Arc<BuildState>,
    pub limiter: ConcurrencyLimiter,
}


/// A node process started inside a detached session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchHandle {
    pub node: usize,
    /// SSH address of the host.
    pub host: String,
    pub container: String,
    /// Tmux session the process runs in.
    pub session: String,
}


/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deployment {
    /// Wallet address of each node, in node order.
    pub addresses: Vec<String>,
    /// Comma-joined addresses every node unlocks.
    pub unlock: String,
    /// Static peer list shared by every node.
    pub peers: Vec<String>,
    pub launches: Vec<LaunchHandle>,
}


/// Progress increments an error-free build makes for `hosts` hosts and
/// `nodes` nodes.
pub fn total_steps(hosts: usize, nodes: usize) -> usize {
    7 + 2 * hosts + 6 * nodes
}
