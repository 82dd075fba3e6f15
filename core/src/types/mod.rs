//! Core data model for a deployment.

pub mod deployment;
pub mod fleet;
pub mod peer;
pub mod wallet;

pub use deployment::{DeploymentFile, DeploymentSpec, NetworkParams};
pub use fleet::{Fleet, HostConfig, NodeRef};
pub use peer::PeerIdentity;
pub use wallet::Wallet;
