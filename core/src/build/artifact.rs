//! Transient local artifacts.
//!
//! Files the build writes locally before copying them to the fleet. The file
//! is removed when the `LocalArtifact` is dropped, so every artifact is gone
//! once the build function returns, whether it succeeded or not.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::DeployError;

pub const PASSWORD_FILE: &str = "passwd";
pub const GENESIS_FILE: &str = "CustomGenesis.json";
pub const PEER_LIST_FILE: &str = "static-nodes.json";

#[derive(Debug)]
pub struct LocalArtifact {
    name: &'static str,
    path: PathBuf,
}

impl LocalArtifact {
    /// Write `content` to `dir/name`.
    pub fn write(dir: &Path, name: &'static str, content: &str) -> Result<Self, DeployError> {
        let path = dir.join(name);
        std::fs::write(&path, content).map_err(|source| DeployError::Artifact {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), bytes = content.len(), "wrote artifact");
        Ok(LocalArtifact { name, path })
    }

    /// File name, also used as the name of the staged copy on each host.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LocalArtifact {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove artifact");
        }
    }
}

/// Password file content: the password once per node, newline-joined.
pub fn password_file(password: &str, nodes: usize) -> String {
    let mut out = String::with_capacity((password.len() + 1) * nodes);
    for _ in 0..nodes {
        out.push_str(password);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let artifact = LocalArtifact::write(dir.path(), GENESIS_FILE, "{}").unwrap();
            assert_eq!(std::fs::read_to_string(artifact.path()).unwrap(), "{}");
            artifact.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn write_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalArtifact::write(&dir.path().join("nope"), PASSWORD_FILE, "x").unwrap_err();
        assert!(matches!(err, DeployError::Artifact { .. }));
    }

    #[test]
    fn password_file_has_one_line_per_node() {
        assert_eq!(password_file("second", 3), "second\nsecond\nsecond\n");
    }
}
