//! Node registry.
//!
//! A persistent record of which node of which test network runs where.
//! `NodeStore` is plain create/read/delete; `MemoryStore` keeps records in
//! process and `FileStore` persists them to a YAML file.

pub mod file;
pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;


/// One deployed node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Assigned by the store on insert.
    pub id: u64,
    pub testnet_id: u64,
    pub server_id: u32,
    /// Slot of the node on its server.
    pub local_id: usize,
    pub ip: String,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("node {0} not found")]
    NotFound(u64),
    #[error("registry I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry format: {0}")]
    Format(#[from] serde_yaml::Error),
}

/// Create/read/delete operations over node records.
pub trait NodeStore {
    /// Insert a record, ignoring its `id`. Returns the assigned id.
    fn insert(&mut self, record: NodeRecord) -> Result<u64, RegistryError>;

    fn get(&self, id: u64) -> Result<NodeRecord, RegistryError>;

    fn all(&self) -> Vec<NodeRecord>;

    fn by_server(&self, server_id: u32) -> Vec<NodeRecord> {
        self.all().into_iter().filter(|n| n.server_id == server_id).collect()
    }

    fn by_testnet(&self, testnet_id: u64) -> Vec<NodeRecord> {
        self.all().into_iter().filter(|n| n.testnet_id == testnet_id).collect()
    }

    /// Delete one record. Deleting an unknown id is not an error.
    fn delete(&mut self, id: u64) -> Result<(), RegistryError>;

    /// Delete every record of a test network. Returns how many were removed.
    fn delete_by_testnet(&mut self, testnet_id: u64) -> Result<usize, RegistryError>;

    /// Delete every record on a server. Returns how many were removed.
    fn delete_by_server(&mut self, server_id: u32) -> Result<usize, RegistryError>;
}
