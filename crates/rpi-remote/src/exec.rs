//! Command execution for rpi-remote.
//!
//! Provides the system [`Shell`] and the `/cmd` operation built on it.

use crate::error::{AgentError, Result};
use crate::host::{Shell, ShellOutput};
use crate::protocol::{CmdParams, CmdResult};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace, warn};

/// Default wall-clock budget for `/cmd`.
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs command lines through `sh -c`.
#[derive(Debug, Clone)]
pub struct SystemShell {
    program: String,
}

impl SystemShell {
    /// Shell at `/bin/sh`, resolved through `PATH` as `sh`.
    pub fn new() -> Self {
        Self::with_program("sh")
    }

    /// Use a different shell binary. It must accept `-c <cmd>`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SystemShell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Shell for SystemShell {
    async fn run(&self, cmd: &str, timeout: Duration) -> Result<ShellOutput> {
        debug!(cmd = %cmd, timeout_secs = timeout.as_secs(), "spawning shell command");

        let child = Command::new(&self.program)
            .args(["-c", cmd])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                warn!(error = %e, program = %self.program, "failed to spawn shell");
                AgentError::Spawn(e)
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(AgentError::Wait(e)),
            Err(_) => {
                warn!(cmd = %cmd, timeout_secs = timeout.as_secs(), "command timed out");
                return Err(AgentError::Timeout {
                    cmd: cmd.to_string(),
                    timeout,
                });
            }
        };

        let result = ShellOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: exit_code(output.status),
        };
        debug!(
            code = result.code,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "command completed"
        );
        trace!(stdout = %result.stdout, stderr = %result.stderr, "command output");
        Ok(result)
    }
}

/// Exit code, or the negated signal number for signal-terminated children.
#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// The `/cmd` operation.
pub async fn run_command(
    shell: &dyn Shell,
    params: CmdParams,
    timeout: Duration,
) -> Result<CmdResult> {
    let out = shell.run(&params.cmd, timeout).await?;
    Ok(CmdResult {
        stdout: out.stdout,
        stderr: out.stderr,
        code: out.code,
    })
}
