//! The `/status` operation.
//!
//! Host figures come straight from `free`, `top` and `df`; the pipelines do
//! the column extraction and the text is returned as-is.

use crate::error::Result;
use crate::host::Shell;
use crate::protocol::StatusReport;
use std::time::Duration;
use tracing::debug;

/// Default budget for each probe.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(30);

/// Used/total memory in MB.
pub const MEM_PROBE: &str = r#"free -m | awk 'NR==2{print $3"/"$2"MB"}'"#;

/// The `%Cpu(s)` summary line.
pub const CPU_PROBE: &str = "top -bn1 | head -3 | tail -1";

/// Used/total space on the root filesystem.
pub const DISK_PROBE: &str = r#"df -h / | tail -1 | awk '{print $3"/"$2}'"#;

/// Run the three probes and collect their trimmed stdout.
///
/// Exit codes are ignored: a missing tool just yields an empty field. Launch
/// failures and timeouts propagate.
pub async fn report_status(shell: &dyn Shell, timeout: Duration) -> Result<StatusReport> {
    let mem = probe(shell, MEM_PROBE, timeout).await?;
    let cpu = probe(shell, CPU_PROBE, timeout).await?;
    let disk = probe(shell, DISK_PROBE, timeout).await?;
    debug!(%mem, %cpu, %disk, "status collected");
    Ok(StatusReport { mem, cpu, disk })
}

async fn probe(shell: &dyn Shell, cmd: &str, timeout: Duration) -> Result<String> {
    let out = shell.run(cmd, timeout).await?;
    Ok(out.stdout.trim().to_string())
}
