//! In-process node store.

use serde::{Deserialize, Serialize};

use super::{NodeRecord, NodeStore, RegistryError};

/// Node records held in memory, ids assigned sequentially from 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStore {
    next_id: u64,
    nodes: Vec<NodeRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            next_id: 1,
            nodes: Vec::new(),
        }
    }

    fn retain_counting(&mut self, keep: impl Fn(&NodeRecord) -> bool) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|n| keep(n));
        before - self.nodes.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore for MemoryStore {
    fn insert(&mut self, mut record: NodeRecord) -> Result<u64, RegistryError> {
        record.id = self.next_id;
        self.next_id += 1;
        let id = record.id;
        self.nodes.push(record);
        Ok(id)
    }

    fn get(&self, id: u64) -> Result<NodeRecord, RegistryError> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    fn all(&self) -> Vec<NodeRecord> {
        self.nodes.clone()
    }

    fn delete(&mut self, id: u64) -> Result<(), RegistryError> {
        self.nodes.retain(|n| n.id != id);
        Ok(())
    }

    fn delete_by_testnet(&mut self, testnet_id: u64) -> Result<usize, RegistryError> {
        Ok(self.retain_counting(|n| n.testnet_id != testnet_id))
    }

    fn delete_by_server(&mut self, server_id: u32) -> Result<usize, RegistryError> {
        Ok(self.retain_counting(|n| n.server_id != server_id))
    }
}
