//! End-to-end pipeline runs against `MockExecutor`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use netforge_core::build::orchestrator::{STAGE_LAUNCH, STAGE_PEERS, STAGE_SECRETS, STAGE_STATS};
use netforge_core::build::total_steps;
use netforge_core::infrastructure::{MockExecutor, RemoteCall};
use netforge_core::types::HostConfig;
use netforge_core::{BuildState, DeployConfig, DeployError, DeploymentSpec, Fleet, NetworkParams, Orchestrator};

const NODES: [(&str, usize, &str); 3] = [
    ("h1", 0, "10.1.0.2"),
    ("h1", 1, "10.1.0.6"),
    ("h2", 0, "10.2.0.2"),
];

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
            node_ips: vec!["10.2.0.2".into()],
        },
    ])
}

fn spec() -> DeploymentSpec {
    DeploymentSpec::new(
        3,
        NetworkParams {
            network_id: 77,
            extra_accounts: 2,
            init_balance: "5000".into(),
            ..NetworkParams::default()
        },
    )
}

fn address(i: usize) -> String {
    format!("{:040x}", 0xabc0 + i)
}

/// A fleet whose nodes answer like freshly installed geth containers.
fn scripted_fleet(delay: Duration) -> Arc<MockExecutor> {
    let mock = Arc::new(MockExecutor::with_delay(delay));
    for (i, (host, slot, _)) in NODES.iter().enumerate() {
        mock.respond_on(
            host,
            *slot,
            "account new",
            &format!("Your new key was generated\nAddress: {{{}}}\n", address(i)),
        );
        mock.respond_on(
            host,
            *slot,
            "cat /geth/keystore",
            &format!("{{\"address\":\"{}\",\"version\":3}}\n", address(i)),
        );
        mock.respond_on(
            host,
            *slot,
            "admin.nodeInfo.enode",
            &format!(
                "instance: Geth/v1.8.2\n> \"enode://{:0>8}@[::]:30303?discport=0\"\n> ",
                i
            ),
        );
    }
    mock
}

fn orchestrator(mock: Arc<MockExecutor>, dir: &std::path::Path, limit: u32) -> Orchestrator {
    let config = DeployConfig {
        artifact_dir: dir.to_path_buf(),
        thread_limit: limit,
        ..DeployConfig::default()
    };
    Orchestrator::new(config, mock).unwrap()
}

fn uploaded(mock: &MockExecutor, file: &str) -> Vec<String> {
    mock.calls()
        .into_iter()
        .filter_map(|c| match c {
            RemoteCall::Upload { remote, content, .. } if remote.ends_with(file) => content,
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn three_nodes_on_two_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let mock = scripted_fleet(Duration::from_millis(1));
    let orch = orchestrator(Arc::clone(&mock), dir.path(), 2);
    let state = Arc::new(BuildState::new());

    let deployment = orch.run(&spec(), &fleet(), Arc::clone(&state)).await.unwrap();

    // one wallet per node, in node order
    let expected: Vec<String> = (0..3).map(address).collect();
    assert_eq!(deployment.addresses, expected);
    assert_eq!(deployment.unlock, expected.join(","));

    // genesis funds the three wallets and two synthetic accounts
    let genesis = uploaded(&mock, "CustomGenesis.json");
    assert_eq!(genesis.len(), 2);
    let doc: serde_json::Value = serde_json::from_str(&genesis[0]).unwrap();
    let alloc = doc["alloc"].as_object().unwrap();
    assert_eq!(alloc.len(), 5);
    for a in &expected {
        assert_eq!(alloc[a.as_str()]["balance"], "5000");
    }
    assert!(alloc.contains_key("0x0000000000000000000000000000000000000002"));
    assert_eq!(doc["config"]["chainId"], 77);

    // peers carry each node's own address
    assert_eq!(deployment.peers.len(), 3);
    for (peer, (_, _, ip)) in deployment.peers.iter().zip(NODES.iter()) {
        assert!(peer.ends_with(&format!("@{}:30303", ip)), "{}", peer);
    }
    let staged_list: Vec<String> =
        serde_json::from_str(&uploaded(&mock, "static-nodes.json")[0]).unwrap();
    assert_eq!(staged_list, deployment.peers);

    // every node unlocks every wallet and mines to its own
    for (i, handle) in deployment.launches.iter().enumerate() {
        assert_eq!(handle.node, i);
        assert_eq!(handle.host, NODES[i].0);
    }
    let starts: Vec<String> = mock
        .texts()
        .into_iter()
        .filter(|t| t.contains("tmux send-keys -t whiteblock"))
        .collect();
    assert_eq!(starts.len(), 3);
    assert!(starts.iter().all(|s| s.contains(&deployment.unlock)));

    assert_eq!(state.completed(), total_steps(2, 3));
    assert_eq!(state.total(), total_steps(2, 3));
    assert!(mock.peak_concurrency() <= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn progress_never_goes_backwards() {
    let dir = tempfile::tempdir().unwrap();
    let mock = scripted_fleet(Duration::from_millis(2));
    let orch = orchestrator(Arc::clone(&mock), dir.path(), 2);
    let state = Arc::new(BuildState::new());
    let done = Arc::new(AtomicBool::new(false));

    let sampler = tokio::spawn({
        let state = Arc::clone(&state);
        let done = Arc::clone(&done);
        async move {
            let mut samples = Vec::new();
            while !done.load(Ordering::SeqCst) {
                samples.push(state.completed());
                tokio::time::sleep(Duration::from_micros(200)).await;
            }
            samples.push(state.completed());
            samples
        }
    });

    orch.run(&spec(), &fleet(), Arc::clone(&state)).await.unwrap();
    done.store(true, Ordering::SeqCst);
    let samples = sampler.await.unwrap();

    assert!(samples.len() > 2);
    assert!(samples.windows(2).all(|w| w[0] <= w[1]), "{:?}", samples);
    assert_eq!(samples.last().copied(), Some(total_steps(2, 3)));
}

#[tokio::test]
async fn phases_run_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mock = scripted_fleet(Duration::from_millis(1));
    orchestrator(Arc::clone(&mock), dir.path(), 3)
        .build(&spec(), &fleet())
        .await
        .unwrap();

    let first = |needle: &str| mock.first_position(needle).unwrap();
    let last = |needle: &str| mock.last_position(needle).unwrap();

    // credentials are distributed before any node creates an account
    assert!(last("cp /home/appo/passwd") < first("account new"));
    // every wallet exists before genesis goes out
    assert!(last("cat /geth/keystore") < first("CustomGenesis.json"));
    assert!(last("account new") < first("CustomGenesis.json"));
    // storage is initialised only after every keystore import
    assert!(last(">>/geth/keystore/account") < first(" init "));
    // no node starts before the peer list reached every host
    assert!(last("static-nodes.json /home/appo") < first("tmux send-keys -t whiteblock"));
    // stats come last
    assert!(last("tmux send-keys -t whiteblock") < first("npm start"));
}

#[tokio::test]
async fn wallet_failure_stops_before_genesis() {
    let dir = tempfile::tempdir().unwrap();
    let mock = scripted_fleet(Duration::ZERO);
    mock.respond_on("h1", 1, "account new", "Fatal: could not decrypt key");
    let state = Arc::new(BuildState::new());
    let err = orchestrator(Arc::clone(&mock), dir.path(), 3)
        .run(&spec(), &fleet(), Arc::clone(&state))
        .await
        .unwrap_err();

    match err {
        DeployError::Reported { count, first, .. } => {
            assert_eq!(count, 1);
            assert_eq!(first.node, Some(1));
        }
        other => panic!("unexpected error {other}"),
    }
    // the other two nodes still finished their wallets
    assert_eq!(
        mock.texts().iter().filter(|t| t.contains("cat /geth/keystore")).count(),
        2
    );
    assert!(uploaded(&mock, "CustomGenesis.json").is_empty());
    assert!(state.completed() < state.total());
}

#[tokio::test]
async fn unparseable_identity_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mock = scripted_fleet(Duration::ZERO);
    mock.respond_on("h2", 0, "admin.nodeInfo.enode", "Fatal: database already in use");
    let state = Arc::new(BuildState::new());
    let err = orchestrator(Arc::clone(&mock), dir.path(), 3)
        .run(&spec(), &fleet(), Arc::clone(&state))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Parse(_)));
    assert_eq!(state.stage(), STAGE_PEERS);
    assert!(uploaded(&mock, "static-nodes.json").is_empty());
}

#[tokio::test]
async fn password_upload_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mock = scripted_fleet(Duration::ZERO);
    mock.fail("upload", "scp: connection reset");
    let state = Arc::new(BuildState::new());
    let err = orchestrator(Arc::clone(&mock), dir.path(), 3)
        .run(&spec(), &fleet(), Arc::clone(&state))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Exec(_)));
    assert!(mock.first_position("account new").is_none());
    assert_eq!(state.stage(), STAGE_SECRETS);
}

#[tokio::test]
async fn launch_failure_skips_stats() {
    let dir = tempfile::tempdir().unwrap();
    let mock = scripted_fleet(Duration::ZERO);
    mock.fail_on("h1", 0, "tmux new -s whiteblock", "tmux: not found");
    let state = Arc::new(BuildState::new());
    let err = orchestrator(Arc::clone(&mock), dir.path(), 3)
        .run(&spec(), &fleet(), Arc::clone(&state))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Reported { count: 1, .. }));
    assert_eq!(state.stage(), STAGE_LAUNCH);
    assert!(mock.first_position("npm start").is_none());
    assert!(dir.path().read_dir().unwrap().next().is_none());
}

#[tokio::test]
async fn stats_failures_fail_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let mock = scripted_fleet(Duration::ZERO);
    mock.fail_on("h2", 0, "INSTANCE_NAME", "sed: can't read app.json");
    let state = Arc::new(BuildState::new());
    let err = orchestrator(Arc::clone(&mock), dir.path(), 3)
        .run(&spec(), &fleet(), Arc::clone(&state))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Reported { .. }));
    assert_eq!(state.stage(), STAGE_STATS);
    // every node was launched before the stats phase failed
    assert_eq!(
        mock.texts().iter().filter(|t| t.contains("tmux send-keys -t whiteblock")).count(),
        3
    );
}
