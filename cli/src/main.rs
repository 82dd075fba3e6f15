//! Netforge CLI — the command-line entry point for test network deployment.
//!
//! # Usage
//!
//! ```text
//! netforge deploy --spec testnet.yaml --config netforge.yaml
//! netforge nodes list --testnet 3
//! netforge nodes show 12
//! netforge nodes delete --testnet 3
//! netforge genesis --spec testnet.yaml --address 0x1f... --address 0x2e...
//! ```

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use netforge_core::build::genesis::GenesisBuilder;
use netforge_core::config::{self, DeployConfig};
use netforge_core::infrastructure::{ShellRunner, SshExecutor};
use netforge_core::registry::{FileStore, NodeRecord, NodeStore};
use netforge_core::types::deployment;
use netforge_core::{BuildState, DeployError, Deployment, Fleet, Orchestrator};

const DEFAULT_REGISTRY: &str = "netforge-nodes.yaml";


#[derive(Parser)]
#[command(name = "netforge")]
#[command(about = "Provision multi-node blockchain test networks")]
#[command(version)]
struct Cli {
    /// Log filter directive, e.g. `debug` or `netforge_core=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a test network described by a deployment file
    Deploy {
        /// Deployment file (node count, network params, hosts)
        #[arg(long)]
        spec: PathBuf,

        /// Tool configuration (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Test network id to record nodes under (next free id by default)
        #[arg(long)]
        testnet: Option<u64>,

        #[arg(long, default_value = DEFAULT_REGISTRY)]
        registry: PathBuf,
    },

    /// Inspect and remove recorded nodes
    Nodes {
        #[command(subcommand)]
        command: NodesCommand,

        #[arg(long, global = true, default_value = DEFAULT_REGISTRY)]
        registry: PathBuf,
    },

    /// Render a genesis document to stdout without touching the fleet
    Genesis {
        #[arg(long)]
        spec: PathBuf,

        /// Funded address; repeat for several
        #[arg(long = "address")]
        addresses: Vec<String>,
    },
}

#[derive(Subcommand)]
enum NodesCommand {
    /// List recorded nodes
    List {
        #[command(flatten)]
        filter: NodeFilter,
    },
    /// Show one node
    Show { id: u64 },
    /// Delete one node, or every node of a testnet or server
    Delete {
        id: Option<u64>,

        #[command(flatten)]
        filter: NodeFilter,
    },
}

#[derive(Args)]
struct NodeFilter {
    #[arg(long, conflicts_with = "server")]
    testnet: Option<u64>,

    #[arg(long)]
    server: Option<u32>,
}


#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let result = match cli.command {
        Commands::Deploy {
            spec,
            config,
            testnet,
            registry,
        } => deploy(&spec, config.as_deref(), testnet, &registry).await,
        Commands::Nodes { command, registry } => nodes(command, &registry),
        Commands::Genesis { spec, addresses } => genesis(&spec, &addresses),
    };

    if let Err(e) = result {
        eprintln!("netforge: {}", e);
        process::exit(1);
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("netforge=info,netforge_core=info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}


// ---------------------------------------------------------------------------
// deploy
// ---------------------------------------------------------------------------

async fn deploy(
    spec_path: &Path,
    config_path: Option<&Path>,
    testnet: Option<u64>,
    registry_path: &Path,
) -> Result<(), DeployError> {
    let config = match config_path {
        Some(path) => config::load(path)?,
        None => DeployConfig::default(),
    };
    let file = deployment::load(spec_path)?;
    let mut store = FileStore::open(registry_path)?;
    let testnet_id = testnet.unwrap_or_else(|| next_testnet_id(&store));

    let executor = Arc::new(SshExecutor::new(
        Arc::new(ShellRunner),
        config.ssh.clone(),
        &config.container_prefix,
    ));
    let orchestrator = Orchestrator::new(config, executor)?;
    let state = Arc::new(BuildState::new());

    let reporter = tokio::spawn(report_progress(Arc::clone(&state)));
    let result = orchestrator
        .run(&file.spec, &file.hosts, Arc::clone(&state))
        .await;
    reporter.abort();
    let deployment = result?;

    let recorded = record_nodes(&mut store, testnet_id, &file.hosts)?;
    info!(testnet = testnet_id, nodes = recorded, registry = %registry_path.display(), "nodes recorded");
    print_deployment(&deployment)
}

async fn report_progress(state: Arc<BuildState>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let status = state.status();
        info!(
            stage = %status.stage,
            completed = status.completed,
            total = status.total,
            errors = status.errors,
            "progress"
        );
    }
}

fn next_testnet_id(store: &impl NodeStore) -> u64 {
    store.all().iter().map(|n| n.testnet_id).max().map_or(1, |max| max + 1)
}

fn record_nodes(store: &mut impl NodeStore, testnet_id: u64, fleet: &Fleet) -> Result<usize, DeployError> {
    let mut count = 0;
    for node in fleet.nodes() {
        store.insert(NodeRecord {
            id: 0,
            testnet_id,
            server_id: fleet.host(node.host).server_id,
            local_id: node.slot,
            ip: node.ip.clone(),
        })?;
        count += 1;
    }
    Ok(count)
}

fn print_deployment(deployment: &Deployment) -> Result<(), DeployError> {
    let json = serde_json::to_string_pretty(deployment).map_err(|source| DeployError::Encode {
        what: "deployment",
        source,
    })?;
    println!("{}", json);
    Ok(())
}


// ---------------------------------------------------------------------------
// nodes
// ---------------------------------------------------------------------------

fn nodes(command: NodesCommand, registry_path: &Path) -> Result<(), DeployError> {
    let mut store = FileStore::open(registry_path)?;
    match command {
        NodesCommand::List { filter } => {
            let records = match (filter.testnet, filter.server) {
                (Some(t), _) => store.by_testnet(t),
                (None, Some(s)) => store.by_server(s),
                (None, None) => store.all(),
            };
            if records.is_empty() {
                println!("No nodes recorded.");
            }
            for r in &records {
                println!("{}", format_record(r));
            }
        }
        NodesCommand::Show { id } => {
            println!("{}", format_record(&store.get(id)?));
        }
        NodesCommand::Delete { id, filter } => {
            let removed = match (id, filter.testnet, filter.server) {
                (Some(id), None, None) => store.delete(id).map(|_| 1)?,
                (None, Some(t), None) => store.delete_by_testnet(t)?,
                (None, None, Some(s)) => store.delete_by_server(s)?,
                _ => {
                    return Err(DeployError::ConfigInvalid(
                        "give exactly one of <id>, --testnet or --server".into(),
                    ))
                }
            };
            if removed == 0 {
                warn!("no matching nodes");
            }
            println!("Deleted {} node(s).", removed);
        }
    }
    Ok(())
}

fn format_record(r: &NodeRecord) -> String {
    format!(
        "{:>5}  testnet {:<4} server {:<4} slot {:<3} {}",
        r.id, r.testnet_id, r.server_id, r.local_id, r.ip
    )
}


// ---------------------------------------------------------------------------
// genesis
// ---------------------------------------------------------------------------

fn genesis(spec_path: &Path, addresses: &[String]) -> Result<(), DeployError> {
    let file = deployment::load(spec_path)?;
    let (_, rendered) = GenesisBuilder::default().render(&file.spec, addresses)?;
    println!("{}", rendered);
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use netforge_core::registry::MemoryStore;
    use netforge_core::types::HostConfig;

    fn fleet() -> Fleet {
        Fleet::new(vec![
            HostConfig {
                server_id: 4,
                addr: "h1".into(),
                gateway: "10.4.0.1".into(),
                node_ips: vec!["10.4.0.2".into(), "10.4.0.6".into()],
            },
            HostConfig {
                server_id: 7,
                addr: "h2".into(),
                gateway: "10.7.0.1".into(),
                node_ips: vec!["10.7.0.2".into()],
            },
        ])
    }

    #[test]
    fn cli_parses_deploy() {
        let cli = Cli::try_parse_from(["netforge", "deploy", "--spec", "net.yaml", "--testnet", "3"]).unwrap();
        match cli.command {
            Commands::Deploy { spec, testnet, registry, config } => {
                assert_eq!(spec, PathBuf::from("net.yaml"));
                assert_eq!(testnet, Some(3));
                assert_eq!(registry, PathBuf::from(DEFAULT_REGISTRY));
                assert!(config.is_none());
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn cli_rejects_conflicting_filters() {
        let parsed = Cli::try_parse_from(["netforge", "nodes", "list", "--testnet", "1", "--server", "2"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn every_node_is_recorded() {
        let mut store = MemoryStore::new();
        assert_eq!(record_nodes(&mut store, 9, &fleet()).unwrap(), 3);
        let on_seven = store.by_server(7);
        assert_eq!(on_seven.len(), 1);
        assert_eq!(on_seven[0].ip, "10.7.0.2");
        assert_eq!(on_seven[0].local_id, 0);
        assert_eq!(store.by_testnet(9).len(), 3);
    }

    #[test]
    fn testnet_ids_continue_from_the_highest() {
        let mut store = MemoryStore::new();
        assert_eq!(next_testnet_id(&store), 1);
        record_nodes(&mut store, 4, &fleet()).unwrap();
        assert_eq!(next_testnet_id(&store), 5);
    }
}
