//! YAML-file-backed node store.
//!
//! The whole registry is read on open and rewritten after every mutation.
//! A missing file is an empty registry.

use std::path::{Path, PathBuf};

use super::memory::MemoryStore;
use super::{NodeRecord, NodeStore, RegistryError};

pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        let inner = match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => MemoryStore::new(),
            Ok(content) => serde_yaml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryStore::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(FileStore {
            path: path.to_path_buf(),
            inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let yaml = serde_yaml::to_string(&self.inner)?;
        let tmp = self.path.with_extension("yaml.tmp");
        std::fs::write(&tmp, yaml)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl NodeStore for FileStore {
    fn insert(&mut self, record: NodeRecord) -> Result<u64, RegistryError> {
        let id = self.inner.insert(record)?;
        self.flush()?;
        Ok(id)
    }

    fn get(&self, id: u64) -> Result<NodeRecord, RegistryError> {
        self.inner.get(id)
    }

    fn all(&self) -> Vec<NodeRecord> {
        self.inner.all()
    }

    fn delete(&mut self, id: u64) -> Result<(), RegistryError> {
        self.inner.delete(id)?;
        self.flush()
    }

    fn delete_by_testnet(&mut self, testnet_id: u64) -> Result<usize, RegistryError> {
        let n = self.inner.delete_by_testnet(testnet_id)?;
        self.flush()?;
        Ok(n)
    }

    fn delete_by_server(&mut self, server_id: u32) -> Result<usize, RegistryError> {
        let n = self.inner.delete_by_server(server_id)?;
        self.flush()?;
        Ok(n)
    }
}
