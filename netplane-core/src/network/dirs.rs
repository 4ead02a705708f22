//! Per-network state directories on the local member.

use crate::error::{NetplaneError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory tree holding one sub-directory per network name.
#[derive(Debug, Clone)]
pub struct NetworkDirs {
    root: PathBuf,
}

impl NetworkDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub async fn exists(&self, name: &str) -> bool {
        tokio::fs::try_exists(self.path(name)).await.unwrap_or(false)
    }

    /// Remove a network's directory. A missing directory is not an error.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed network directory");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NetplaneError::IoError { path, source: e }),
        }
    }

    /// Move a network's directory to a new name. A missing source is not an error.
    pub async fn rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        if !self.exists(old_name).await {
            return Ok(());
        }

        let from = self.path(old_name);
        let to = self.path(new_name);
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| NetplaneError::IoError { path: from.clone(), source: e })?;

        debug!(from = %from.display(), to = %to.display(), "Renamed network directory");
        Ok(())
    }
}
