//! Netforge core — provisioning of multi-node blockchain test networks.
//!
//! This crate drives the deployment of a test network across a fleet of
//! remote hosts: per-node credentials, a shared genesis document, static
//! peering and the start of every node process, with progress and failures
//! collected in one shared build state. It never installs a logging
//! subscriber; callers decide where `tracing` output goes.
//!
//! # Modules
//!
//! - [`build`] — The phased deployment pipeline and its components
//! - [`config`] — Tool configuration loaded from YAML
//! - [`error`] — `DeployError`, the error every operation returns
//! - [`infrastructure`] — Remote execution over ssh/docker and its test double
//! - [`registry`] — Persistent records of deployed nodes
//! - [`template`] — Value substitution into base documents
//! - [`types`] — Deployment spec, fleet, wallets and peer identities

pub mod build;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod registry;
pub mod template;
pub mod types;

pub use build::{BuildState, Deployment, LaunchHandle, Orchestrator};
pub use config::DeployConfig;
pub use error::DeployError;
pub use types::{DeploymentSpec, Fleet, NetworkParams};
