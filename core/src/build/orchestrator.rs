//! Build orchestrator — runs the deployment phases in order.
//!
//! `Orchestrator` wires the phase components to the injected
//! `RemoteExecutor` (`SshExecutor` in production, `MockExecutor` in tests).
//! Phases never overlap: each one drains the limiter before the next starts,
//! and a barrier that finds reported errors ends the build. Sequential steps
//! fail the build on their first error. Remote side effects already made are
//! not rolled back; only staged copies and local artifacts are removed.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::artifact::{password_file, LocalArtifact, GENESIS_FILE, PASSWORD_FILE, PEER_LIST_FILE};
use super::genesis::GenesisBuilder;
use super::launcher::NodeLauncher;
use super::limiter::ConcurrencyLimiter;
use super::peers::PeerAddressResolver;
use super::state::BuildState;
use super::stats::StatsRegistrar;
use super::wallet::WalletProvisioner;
use super::{total_steps, BuildContext, Deployment, LaunchHandle};
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::infrastructure::tmux::TmuxCommandBuilder;
use crate::infrastructure::{ExecError, RemoteExecutor};
use crate::template::TemplateRenderer;
use crate::types::deployment::DeploymentSpec;
use crate::types::fleet::Fleet;
use crate::types::wallet::unlock_list;

pub const STAGE_SECRETS: &str = "Distributing secrets";
pub const STAGE_WALLETS: &str = "Creating the wallets";
pub const STAGE_GENESIS: &str = "Creating the genesis block";
pub const STAGE_BOOTSTRAP: &str = "Bootstrapping network";
pub const STAGE_PEERS: &str = "Resolving peers";
pub const STAGE_LAUNCH: &str = "Starting geth";
pub const STAGE_STATS: &str = "Starting network stats";
pub const STAGE_DONE: &str = "Network running";


pub struct Orchestrator {
    config: Arc<DeployConfig>,
    executor: Arc<dyn RemoteExecutor>,
    genesis: GenesisBuilder,
    cancel: CancellationToken,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish()
    }
}

impl Orchestrator {
    /// Create an orchestrator. The configuration is validated here so that a
    /// bad value never reaches the fleet.
    pub fn new(config: DeployConfig, executor: Arc<dyn RemoteExecutor>) -> Result<Self, DeployError> {
        config.validate()?;
        Ok(Orchestrator {
            config: Arc::new(config),
            executor,
            genesis: GenesisBuilder::default(),
            cancel: CancellationToken::new(),
        })
    }

    /// Render genesis documents with `renderer` instead of the bundled one.
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.genesis = GenesisBuilder::new(renderer);
        self
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Provision and start a network of `spec.nodes` nodes on `fleet`.
    pub async fn build(&self, spec: &DeploymentSpec, fleet: &Fleet) -> Result<Deployment, DeployError> {
        self.run(spec, fleet, Arc::new(BuildState::new())).await
    }

    /// Like `build`, reporting into a caller-owned `BuildState` so progress
    /// can be observed while the build runs.
    pub async fn run(
        &self,
        spec: &DeploymentSpec,
        fleet: &Fleet,
        state: Arc<BuildState>,
    ) -> Result<Deployment, DeployError> {
        spec.validate(fleet)?;
        state.set_total_steps(total_steps(fleet.hosts().len(), fleet.node_count()));

        // Waiters still queued on the limiter are released when the build returns.
        let cancel = self.cancel.child_token();
        let _guard = cancel.clone().drop_guard();
        let ctx = BuildContext {
            config: Arc::clone(&self.config),
            executor: Arc::clone(&self.executor),
            state: Arc::clone(&state),
            limiter: ConcurrencyLimiter::new(self.config.thread_limit, cancel),
        };

        info!(nodes = spec.nodes, hosts = fleet.hosts().len(), network_id = spec.params.network_id, "build started");
        let result = self.phases(&ctx, spec, fleet).await;
        self.remove_staged(&ctx, fleet).await;

        match &result {
            Ok(_) => info!(
                completed = state.completed(),
                total = state.total(),
                "build finished"
            ),
            Err(e) => error!(stage = %state.stage(), error = %e, "build failed"),
        }
        result
    }

    /// Whether the process behind `handle` still has its tmux session. A
    /// failed `has-session` means the session is gone; a command that could
    /// not be run at all is an error.
    pub async fn is_running(&self, fleet: &Fleet, handle: &LaunchHandle) -> Result<bool, DeployError> {
        let node = fleet.nodes().into_iter().nth(handle.node).ok_or_else(|| {
            DeployError::ConfigInvalid(format!("fleet has no node {}", handle.node))
        })?;
        let host = fleet.host(node.host);
        let cmd = TmuxCommandBuilder::new().has_session(&handle.session);
        match self.executor.exec(host, node.slot, &cmd).await {
            Ok(_) => Ok(true),
            Err(ExecError::Failed { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Grow a running network. Not supported for this chain.
    pub async fn add_nodes(&self, _fleet: &Fleet, _new_nodes: &Fleet) -> Result<Deployment, DeployError> {
        Err(DeployError::Unsupported("adding nodes to a running network"))
    }

    async fn phases(
        &self,
        ctx: &BuildContext,
        spec: &DeploymentSpec,
        fleet: &Fleet,
    ) -> Result<Deployment, DeployError> {
        let state = &ctx.state;
        let dir = &self.config.artifact_dir;
        let launcher = NodeLauncher::new(ctx.clone());

        state.set_stage(STAGE_SECRETS);
        let passwd = LocalArtifact::write(
            dir,
            PASSWORD_FILE,
            &password_file(&self.config.password, spec.nodes),
        )?;
        state.increment_progress();
        launcher.distribute_secrets(fleet, &passwd).await?;

        state.set_stage(STAGE_WALLETS);
        let wallets = WalletProvisioner::new(ctx.clone()).provision(fleet).await?;
        state.increment_progress();
        let addresses: Vec<String> = wallets.iter().map(|w| w.address.clone()).collect();

        state.set_stage(STAGE_GENESIS);
        let (_, genesis) = self.genesis.write(spec, &addresses, dir)?;
        state.increment_progress();

        state.set_stage(STAGE_BOOTSTRAP);
        launcher.bootstrap(fleet, &genesis, &wallets).await?;

        state.set_stage(STAGE_PEERS);
        let resolver = PeerAddressResolver::new(ctx.clone());
        let identities = resolver.resolve(fleet, &spec.params).await?;
        let (peers, peer_list) = resolver.write_peer_list(&identities)?;

        state.set_stage(STAGE_LAUNCH);
        launcher.distribute_peer_list(fleet, &peer_list).await?;
        let launches = launcher
            .launch(fleet, &spec.params, &peer_list, &wallets)
            .await?;
        state.increment_progress();

        state.set_stage(STAGE_STATS);
        StatsRegistrar::new(ctx.clone()).register(fleet).await?;

        state.set_stage(STAGE_DONE);
        Ok(Deployment {
            unlock: unlock_list(&wallets),
            addresses,
            peers,
            launches,
        })
    }

    /// Best-effort removal of the staged copies on every host.
    async fn remove_staged(&self, ctx: &BuildContext, fleet: &Fleet) {
        let files: Vec<String> = [PASSWORD_FILE, GENESIS_FILE, PEER_LIST_FILE]
            .iter()
            .map(|f| self.config.staged(f))
            .collect();
        let cmd = format!("rm -f {}", files.join(" "));
        for host in fleet.hosts() {
            if let Err(e) = ctx.executor.run(host, &cmd).await {
                warn!(host = %host.addr, error = %e, "failed to remove staged artifacts");
            }
        }
    }
}
