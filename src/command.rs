//! Watched child process
//!
//! Runs the command whose output the console shows and forwards each line of
//! stdout and stderr through a channel, so logging happens on the UI thread.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Output of the watched command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
    /// One line of stdout or stderr, without the line terminator
    Line(String),
    /// The command finished; carries a human-readable status
    Exited(String),
}

pub type CommandEventSender = mpsc::UnboundedSender<CommandEvent>;
pub type CommandEventReceiver = mpsc::UnboundedReceiver<CommandEvent>;

/// Start `program` with `args` and stream its output into `sender`
///
/// Must be called from within a tokio runtime.
pub fn spawn_command(program: &str, args: &[String], sender: CommandEventSender) -> Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start '{}'", program))?;

    let stdout = child.stdout.take().context("Child stdout was not captured")?;
    let stderr = child.stderr.take().context("Child stderr was not captured")?;

    let out_task = tokio::spawn(forward_lines(stdout, sender.clone()));
    let err_task = tokio::spawn(forward_lines(stderr, sender.clone()));

    tokio::spawn(async move {
        // Drain both pipes before reporting the exit so it is the last event
        let _ = out_task.await;
        let _ = err_task.await;
        let status = match child.wait().await {
            Ok(status) => match status.code() {
                Some(code) => format!("exited with code {}", code),
                None => "terminated by signal".to_string(),
            },
            Err(e) => format!("wait failed: {}", e),
        };
        tracing::info!("Watched command {}", status);
        let _ = sender.send(CommandEvent::Exited(status));
    });

    Ok(())
}

async fn forward_lines<R>(reader: R, sender: CommandEventSender)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if sender.send(CommandEvent::Line(line)).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Stopped reading command output: {}", e);
                break;
            }
        }
    }
}
