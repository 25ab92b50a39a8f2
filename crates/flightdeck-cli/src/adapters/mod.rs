//! Process- and network-backed implementations of the collaborator traits.

use std::process::Stdio;

use anyhow::{Context, bail};
use tokio::process::Command;
use tracing::debug;

pub mod bosh;
pub mod certs;
pub mod fly;
pub mod ip;
pub mod route53;
pub mod terraform;

/// Run `cmd` to completion with the operator's terminal attached.
pub(crate) async fn run_inherited(cmd: &mut Command, what: &str) -> anyhow::Result<()> {
    debug!(command = ?cmd, "running {what}");
    let status = cmd
        .stdin(Stdio::null())
        .status()
        .await
        .with_context(|| format!("failed to execute {what}"))?;
    if !status.success() {
        bail!("{what} failed (exit code: {})", status.code().unwrap_or(-1));
    }
    Ok(())
}

/// Run `cmd` to completion and return its stdout. stderr stays attached
/// to the terminal.
pub(crate) async fn run_captured(cmd: &mut Command, what: &str) -> anyhow::Result<Vec<u8>> {
    debug!(command = ?cmd, "running {what}");
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()
        .await
        .with_context(|| format!("failed to execute {what}"))?;
    if !output.status.success() {
        bail!(
            "{what} failed (exit code: {})",
            output.status.code().unwrap_or(-1)
        );
    }
    Ok(output.stdout)
}
