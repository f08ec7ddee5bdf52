//! Running a configured external program with input on stdin.

use std::process::{ExitStatus, Stdio};

use anyhow::Context;
use conductor_core::config::CommandSpec;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Last non-empty stderr line, for error messages.
    pub fn stderr_tail(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
    }
}

/// Spawn `spec`, feed `input` on stdin and collect both output streams.
///
/// The child is killed if the returned future is dropped, so a timed-out
/// attempt does not leave the process behind.
pub async fn run_command(
    spec: &CommandSpec,
    input: &str,
    extra_env: &[(&str, String)],
) -> anyhow::Result<CommandOutput> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(&spec.env)
        .envs(extra_env.iter().map(|(k, v)| (*k, v.as_str())))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = spec.cwd.as_deref().filter(|c| !c.trim().is_empty()) {
        cmd.current_dir(cwd);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn '{}'", spec.program))?;

    // Write stdin concurrently with draining stdout so large payloads cannot
    // deadlock on full pipes.
    let writer = child.stdin.take().map(|mut stdin| {
        let input = input.to_owned();
        tokio::spawn(async move {
            match stdin.write_all(input.as_bytes()).await {
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        })
    });

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("failed to wait for '{}'", spec.program))?;

    if let Some(writer) = writer {
        writer
            .await
            .context("stdin writer panicked")?
            .with_context(|| format!("failed to write stdin of '{}'", spec.program))?;
    }

    Ok(CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
