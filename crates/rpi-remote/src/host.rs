//! Host capabilities used by the operations.
//!
//! Operations never touch the process table or the filesystem directly;
//! they go through these traits so tests can swap in fakes. The production
//! implementations are [`crate::exec::SystemShell`] and
//! [`crate::fs::LocalFiles`].

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Captured outcome of a finished shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
    /// Exit status; `-N` when killed by signal `N`.
    pub code: i32,
}

/// Runs a shell command line with a wall-clock budget.
///
/// This is the only place a client-supplied string reaches a shell.
#[async_trait]
pub trait Shell: Send + Sync {
    /// Run `cmd` through the host shell and wait for it.
    ///
    /// Returns [`crate::AgentError::Timeout`] if `timeout` elapses first; the
    /// child is killed in that case.
    async fn run(&self, cmd: &str, timeout: Duration) -> Result<ShellOutput>;
}

/// Filesystem access for `/read` and `/write`.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Whether anything exists at `path`.
    async fn exists(&self, path: &Path) -> bool;

    /// Read the whole file as UTF-8 text.
    async fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Create or truncate `path` and write `content`. Parents are not created.
    async fn write(&self, path: &Path, content: &str) -> Result<()>;
}
