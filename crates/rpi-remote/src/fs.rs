//! File operations for rpi-remote.
//!
//! Provides the local [`FileStore`] and the `/read` and `/write` operations.

use crate::error::{AgentError, Result};
use crate::host::FileStore;
use crate::protocol::{ReadParams, ReadResult, WriteParams, WriteResult};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Filesystem of the host, paths relative to the working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFiles;

#[async_trait]
impl FileStore for LocalFiles {
    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .await
            .map_err(|e| AgentError::io(path, e))
    }

    async fn write(&self, path: &Path, content: &str) -> Result<()> {
        fs::write(path, content)
            .await
            .map_err(|e| AgentError::io(path, e))
    }
}

/// The `/read` operation.
///
/// Only a missing path is answered in-band; an existing path that cannot be
/// read as text (directory, permissions, invalid UTF-8) is an error.
pub async fn read_file(files: &dyn FileStore, params: ReadParams) -> Result<ReadResult> {
    let path = Path::new(&params.path);
    if !files.exists(path).await {
        debug!(path = %params.path, "read of missing path");
        return Ok(ReadResult::missing());
    }

    let content = files.read_to_string(path).await?;
    debug!(path = %params.path, len = content.len(), "file read");
    Ok(ReadResult::found(content))
}

/// The `/write` operation. Truncates, never creates parent directories.
pub async fn write_file(files: &dyn FileStore, params: WriteParams) -> Result<WriteResult> {
    files
        .write(Path::new(&params.path), &params.content)
        .await?;
    debug!(path = %params.path, len = params.content.len(), "file written");
    Ok(WriteResult { ok: true })
}
