//! Per-node credential creation.
//!
//! Each node creates its own account inside its container. The address is
//! read out of the command output and the keystore file is read back so that
//! every other node can later import it.

use tracing::debug;

use super::parse::{AccountAddress, Grammar};
use super::phase::{complete, FanOut};
use super::BuildContext;
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::types::fleet::{Fleet, HostConfig, NodeRef};
use crate::types::wallet::Wallet;

pub struct WalletProvisioner {
    ctx: BuildContext,
}

impl WalletProvisioner {
    pub fn new(ctx: BuildContext) -> Self {
        WalletProvisioner { ctx }
    }

    /// Create one wallet per node, in node order.
    ///
    /// Per-node failures are reported to the build state and do not stop
    /// other nodes; the first of them is returned once the phase has drained.
    pub async fn provision(&self, fleet: &Fleet) -> Result<Vec<Wallet>, DeployError> {
        let mut fan = FanOut::new(&self.ctx.limiter, &self.ctx.state);
        for node in fleet.nodes() {
            let ctx = self.ctx.clone();
            let host = fleet.host(node.host).clone();
            fan.spawn(node.index, provision_one(ctx, host, node)).await?;
        }
        let slots = fan.join().await?;
        self.ctx.state.checkpoint()?;
        complete(slots)
    }
}

/// `geth --datadir <dir>/ --password <dir>/passwd account new`
pub fn create_account_command(config: &DeployConfig) -> String {
    format!(
        "geth --datadir {}/ --password {} account new",
        config.node_dir.trim_end_matches('/'),
        config.node_path("passwd")
    )
}

/// `bash -c 'cat <dir>/keystore/*'`
pub fn read_keystore_command(config: &DeployConfig) -> String {
    format!("bash -c 'cat {}/*'", config.node_path("keystore"))
}

async fn provision_one(
    ctx: BuildContext,
    host: HostConfig,
    node: NodeRef,
) -> Result<Wallet, DeployError> {
    let output = ctx
        .executor
        .exec(&host, node.slot, &create_account_command(&ctx.config))
        .await?;
    let address = AccountAddress::extract(&output)?;
    ctx.state.increment_progress();

    let keystore = ctx
        .executor
        .exec(&host, node.slot, &read_keystore_command(&ctx.config))
        .await?;
    if keystore.trim().is_empty() {
        return Err(DeployError::EmptyKeystore(node.index));
    }
    let wallet = Wallet::new(address, keystore.trim_end());
    ctx.state.increment_progress();
    debug!(node = node.index, address = %wallet.address, "wallet created");
    Ok(wallet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::limiter::ConcurrencyLimiter;
    use crate::build::state::BuildState;
    use crate::infrastructure::MockExecutor;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn fleet() -> Fleet {
        Fleet::new(vec![
            HostConfig {
                server_id: 1,
                addr: "h1".into(),
                gateway: "10.1.0.1".into(),
                node_ips: vec!["10.1.0.2".into(), "10.1.0.6".into()],
            },
            HostConfig {
                server_id: 2,
                addr: "h2".into(),
                gateway: "10.2.0.1".into(),
                node_ips: vec!["10.2.0.2".into(), "10.2.0.6".into()],
            },
        ])
    }

    fn context(mock: Arc<MockExecutor>, limit: u32) -> BuildContext {
        BuildContext {
            config: Arc::new(DeployConfig::default()),
            executor: mock,
            state: Arc::new(BuildState::new()),
            limiter: ConcurrencyLimiter::new(limit, CancellationToken::new()),
        }
    }

    fn script_accounts(mock: &MockExecutor) {
        for (host, slot, addr) in [("h1", 0, "aa01"), ("h1", 1, "bb02"), ("h2", 0, "cc03"), ("h2", 1, "dd04")] {
            mock.respond_on(host, slot, "account new", &format!("Address: {{{}}}\n", addr));
            mock.respond_on(host, slot, "keystore", &format!("{{\"address\":\"{}\"}}\n", addr));
        }
    }

    #[test]
    fn commands_use_node_dir() {
        let cfg = DeployConfig::default();
        assert_eq!(
            create_account_command(&cfg),
            "geth --datadir /geth/ --password /geth/passwd account new"
        );
        assert_eq!(read_keystore_command(&cfg), "bash -c 'cat /geth/keystore/*'");
    }

    #[tokio::test]
    async fn one_wallet_per_node_in_order() {
        let mock = Arc::new(MockExecutor::with_delay(Duration::from_millis(2)));
        script_accounts(&mock);
        let ctx = context(Arc::clone(&mock), 2);
        let wallets = WalletProvisioner::new(ctx.clone()).provision(&fleet()).await.unwrap();
        let addrs: Vec<_> = wallets.iter().map(|w| w.address.as_str()).collect();
        assert_eq!(addrs, vec!["aa01", "bb02", "cc03", "dd04"]);
        assert_eq!(wallets[2].raw, r#"{\"address\":\"cc03\"}"#);
        assert_eq!(ctx.state.completed(), 8);
        assert!(mock.peak_concurrency() <= 2);
    }

    #[tokio::test]
    async fn unparseable_output_fails_only_that_node() {
        let mock = Arc::new(MockExecutor::new());
        script_accounts(&mock);
        mock.respond_on("h2", 0, "account new", "Fatal: no password");
        let ctx = context(Arc::clone(&mock), 4);
        let err = WalletProvisioner::new(ctx.clone()).provision(&fleet()).await.unwrap_err();
        assert!(matches!(err, DeployError::Reported { count: 1, .. }));
        assert_eq!(ctx.state.errors()[0].node, Some(2));
        // the other three nodes still read their keystores
        let reads = mock.texts().iter().filter(|t| t.contains("keystore")).count();
        assert_eq!(reads, 3);
    }

    #[tokio::test]
    async fn empty_keystore_is_an_error() {
        let mock = Arc::new(MockExecutor::new());
        script_accounts(&mock);
        mock.respond_on("h1", 1, "keystore", "  \n");
        let ctx = context(Arc::clone(&mock), 4);
        let result = WalletProvisioner::new(ctx.clone()).provision(&fleet()).await;
        assert!(result.is_err());
        assert!(ctx.state.errors()[0].message.contains("empty keystore"));
    }
}
