//! Remote command execution.
//!
//! Runs one command on a [`RemoteSession`]'s channel, either streaming its
//! output live to the local terminal or capturing stdout.

use russh::client::Msg;
use russh::{Channel, ChannelMsg, Sig};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ServoError};
use crate::exit::ExitOutcome;
use crate::ssh::client::RemoteSession;

/// Captured output of a remote command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit: ExitOutcome,
}

impl RemoteSession {
    /// Run `command`, copying its stdout/stderr to ours as it arrives.
    pub async fn run(mut self, command: &str) -> Result<ExitOutcome> {
        let mut stdout = tokio::io::stdout();
        let mut stderr = tokio::io::stderr();
        let result = exec(&mut self.channel, &self.cancel, command, &mut stdout, &mut stderr).await;
        self.finish(result).await
    }

    /// Run `command`, buffering its output.
    pub async fn capture(mut self, command: &str) -> Result<CommandOutput> {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let result = exec(&mut self.channel, &self.cancel, command, &mut stdout, &mut stderr).await;
        let result = result.map(|exit| CommandOutput {
            stdout,
            stderr,
            exit,
        });
        self.finish(result).await
    }
}

async fn exec<O, E>(
    channel: &mut Channel<Msg>,
    cancel: &CancellationToken,
    command: &str,
    stdout: &mut O,
    stderr: &mut E,
) -> Result<ExitOutcome>
where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    tracing::debug!("exec: {}", command);

    channel
        .exec(true, command.as_bytes())
        .await
        .map_err(|e| ServoError::Ssh(format!("Failed to execute command: {}", e)))?;

    let mut exit = None;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => {
                stdout.write_all(&data).await?;
                stdout.flush().await?;
            }
            Some(ChannelMsg::ExtendedData { data, ext }) => {
                if ext == 1 {
                    stderr.write_all(&data).await?;
                    stderr.flush().await?;
                }
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                exit = Some(ExitOutcome::Code(exit_status));
            }
            Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                exit = Some(ExitOutcome::from_signal(signal_name_str(&signal_name)));
            }
            // exit-status usually trails EOF, keep reading until close
            Some(ChannelMsg::Close) | None => break,
            _ => {}
        }
    }

    finish_outcome(exit, cancel)
}

/// A missing exit status is a cancellation if the token fired, otherwise a
/// transport failure.
pub(crate) fn finish_outcome(exit: Option<ExitOutcome>, cancel: &CancellationToken) -> Result<ExitOutcome> {
    match exit {
        Some(exit) => Ok(exit),
        None if cancel.is_cancelled() => Err(ServoError::Cancelled),
        None => Err(ServoError::Ssh(
            "remote command ended without exit status".to_string(),
        )),
    }
}

pub(crate) fn signal_name_str(sig: &Sig) -> &str {
    match sig {
        Sig::ABRT => "ABRT",
        Sig::ALRM => "ALRM",
        Sig::FPE => "FPE",
        Sig::HUP => "HUP",
        Sig::ILL => "ILL",
        Sig::INT => "INT",
        Sig::KILL => "KILL",
        Sig::PIPE => "PIPE",
        Sig::QUIT => "QUIT",
        Sig::SEGV => "SEGV",
        Sig::TERM => "TERM",
        Sig::USR1 => "USR1",
        Sig::Custom(name) => name,
        #[allow(unreachable_patterns)]
        _ => "UNKNOWN",
    }
}
