//! Hosts, node slots and the node index.
//!
//! `HostConfig` describes one machine of the fleet: where to reach it over
//! SSH and the reachable address of each container slot on it. `Fleet` owns
//! the ordered host list and derives the node index by walking hosts, then
//! their slots. Every phase iterates `Fleet::nodes`, so index `i` refers to
//! the same physical node throughout a build.

use serde::{Deserialize, Serialize};

use crate::config::SshOptions;


// ---------------------------------------------------------------------------
// HostConfig
// ---------------------------------------------------------------------------

/// Configuration for a single host of the fleet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    /// Server identifier, recorded in the node registry.
    pub server_id: u32,
    /// Hostname or IP address used for SSH.
    pub addr: String,
    /// Address at which containers on this host reach the dashboard.
    #[serde(default)]
    pub gateway: String,
    /// Reachable address of each container slot, in slot order.
    pub node_ips: Vec<String>,
}

impl HostConfig {
    /// Build the `user@host` string used in SSH/scp commands.
    pub fn user_at_host(&self, ssh: &SshOptions) -> String {
        format!("{}@{}", ssh.user, self.addr)
    }

    /// Build base SSH arguments (port, key, user@host) without a command.
    pub fn ssh_base_args(&self, ssh: &SshOptions) -> Vec<String> {
        let mut args = vec!["-p".to_string(), ssh.port.to_string()];
        args.extend(common_options(ssh));
        args.push(self.user_at_host(ssh));
        args
    }

    /// Build base scp arguments (port, key); the caller appends source and target.
    pub fn scp_base_args(&self, ssh: &SshOptions) -> Vec<String> {
        let mut args = vec!["-P".to_string(), ssh.port.to_string()];
        args.extend(common_options(ssh));
        args
    }
}

fn common_options(ssh: &SshOptions) -> Vec<String> {
    let mut args = vec![
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "ConnectTimeout=10".to_string(),
    ];
    if let Some(ref key) = ssh.identity {
        args.push("-i".to_string());
        args.push(key.clone());
    }
    args
}


// ---------------------------------------------------------------------------
// NodeRef
// ---------------------------------------------------------------------------

/// One node of the flattened (host, slot) ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    /// Position in the fleet-wide node order.
    pub index: usize,
    /// Position of the host in the fleet.
    pub host: usize,
    /// Container slot on that host.
    pub slot: usize,
    /// Reachable address of the node.
    pub ip: String,
}


// ---------------------------------------------------------------------------
// Fleet
// ---------------------------------------------------------------------------

/// The ordered set of hosts a network is deployed onto.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Fleet {
    hosts: Vec<HostConfig>,
}

impl Fleet {
    pub fn new(hosts: Vec<HostConfig>) -> Self {
        Fleet { hosts }
    }

    pub fn hosts(&self) -> &[HostConfig] {
        &self.hosts
    }

    pub fn host(&self, index: usize) -> &HostConfig {
        &self.hosts[index]
    }

    /// Total number of node slots across all hosts.
    pub fn node_count(&self) -> usize {
        self.hosts.iter().map(|h| h.node_ips.len()).sum()
    }

    /// Every node, hosts first then slots.
    pub fn nodes(&self) -> Vec<NodeRef> {
        let mut out = Vec::with_capacity(self.node_count());
        for (host, config) in self.hosts.iter().enumerate() {
            for (slot, ip) in config.node_ips.iter().enumerate() {
                out.push(NodeRef {
                    index: out.len(),
                    host,
                    slot,
                    ip: ip.clone(),
                });
            }
        }
        out
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn host(addr: &str, ips: &[&str]) -> HostConfig {
        HostConfig {
            server_id: 1,
            addr: addr.to_string(),
            gateway: "10.1.0.1".to_string(),
            node_ips: ips.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn node_index_walks_hosts_then_slots() {
        let fleet = Fleet::new(vec![
            host("h1", &["10.1.0.2", "10.1.0.6"]),
            host("h2", &["10.2.0.2"]),
        ]);
        let nodes = fleet.nodes();
        assert_eq!(fleet.node_count(), 3);
        assert_eq!(nodes[0], NodeRef { index: 0, host: 0, slot: 0, ip: "10.1.0.2".into() });
        assert_eq!(nodes[1], NodeRef { index: 1, host: 0, slot: 1, ip: "10.1.0.6".into() });
        assert_eq!(nodes[2], NodeRef { index: 2, host: 1, slot: 0, ip: "10.2.0.2".into() });
    }

    #[test]
    fn node_index_is_stable_across_calls() {
        let fleet = Fleet::new(vec![host("h1", &["a", "b"]), host("h2", &["c", "d"])]);
        assert_eq!(fleet.nodes(), fleet.nodes());
    }

    #[test]
    fn ssh_args_include_identity() {
        let ssh = SshOptions {
            user: "ubuntu".into(),
            port: 2222,
            identity: Some("/k".into()),
        };
        let args = host("10.0.0.1", &[]).ssh_base_args(&ssh);
        assert_eq!(args[0..2], ["-p".to_string(), "2222".to_string()]);
        assert!(args.windows(2).any(|w| w[0] == "-i" && w[1] == "/k"));
        assert_eq!(args.last().unwrap(), "ubuntu@10.0.0.1");
    }

    #[test]
    fn fleet_yaml_is_a_plain_list() {
        let yaml = "- server_id: 3\n  addr: h1\n  node_ips: [10.0.0.2]\n";
        let fleet: Fleet = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(fleet.hosts().len(), 1);
        assert_eq!(fleet.host(0).gateway, "");
    }
}
