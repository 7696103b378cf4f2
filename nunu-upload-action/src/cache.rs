//! On-disk cache of downloaded tool binaries.
//!
//! Entries live at `<root>/<tool>/<version>/<arch>/` and hold the binary plus
//! a `.complete` marker. An entry only becomes visible through a directory
//! rename, so a reader never sees a half-written entry even when several
//! runners populate the same key at once.

use crate::error::ActionError;
use crate::platform::Architecture;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const COMPLETE_MARKER: &str = ".complete";
const STAGING_PREFIX: &str = ".staging-";

/// Identifies one cached binary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub tool: String,
    pub version: String,
    pub arch: Architecture,
}

impl CacheKey {
    pub fn new(tool: impl Into<String>, version: impl Into<String>, arch: Architecture) -> Self {
        Self {
            tool: tool.into(),
            version: version.into(),
            arch,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolCache {
    root: PathBuf,
}

impl ToolCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default cache root when the runner does not provide one.
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(env!("CARGO_PKG_NAME"))
            .join("tool-cache")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(&key.tool)
            .join(&key.version)
            .join(key.arch.as_str())
    }

    /// Look up a complete entry for `key`.
    #[tracing::instrument(skip(self))]
    pub async fn find(&self, key: &CacheKey) -> Option<PathBuf> {
        let dir = self.entry_dir(key);

        if is_complete(&dir).await {
            tracing::debug!("Cache hit at {}", dir.display());
            Some(dir)
        } else {
            tracing::debug!("Cache miss for {}", dir.display());
            None
        }
    }

    /// Store `source` under `key` as `file_name` and return the entry
    /// directory.
    ///
    /// The file is copied, so `source` stays untouched and may live on a
    /// different filesystem than the cache.
    #[tracing::instrument(skip(self, source), fields(from = %source.display()))]
    pub async fn commit(
        &self,
        source: &Path,
        file_name: &str,
        key: &CacheKey,
    ) -> Result<PathBuf, ActionError> {
        let target = self.entry_dir(key);

        let Some(parent) = target.parent() else {
            return Err(ActionError::GenericIo(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("cache entry {} has no parent", target.display()),
            )));
        };
        tokio::fs::create_dir_all(parent).await?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)?;

        // Copying keeps the permission bits of the source.
        tokio::fs::copy(source, staging.path().join(file_name)).await?;
        tokio::fs::write(staging.path().join(COMPLETE_MARKER), b"").await?;

        if tokio::fs::try_exists(&target).await? && !is_complete(&target).await {
            tracing::warn!("Removing incomplete cache entry at {}", target.display());
            match tokio::fs::remove_dir_all(&target).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }

        match tokio::fs::rename(staging.path(), &target).await {
            Ok(()) => {
                tracing::debug!("Committed cache entry {}", target.display());
            }
            Err(err) if is_complete(&target).await => {
                // Another runner committed the same key first.
                tracing::debug!(
                    "Cache entry {} was committed concurrently ({})",
                    target.display(),
                    err
                );
            }
            Err(err) => return Err(err.into()),
        }

        Ok(target)
    }
}

async fn is_complete(dir: &Path) -> bool {
    tokio::fs::metadata(dir.join(COMPLETE_MARKER))
        .await
        .is_ok_and(|m| m.is_file())
}
