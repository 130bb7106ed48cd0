//! PTY (pseudo-terminal) handling for interactive SSH sessions.
//!
//! Provides full terminal emulation for shell sessions.

use russh::{ChannelMsg, Pty};
use tokio::io::AsyncWriteExt;

use crate::error::{Result, ServoError};
use crate::exit::ExitOutcome;
use crate::ssh::client::RemoteSession;
use crate::ssh::exec::{finish_outcome, signal_name_str};
use crate::terminal::{self, Crossterm, RawModeGuard, ResizeEvents, TerminalControl};

/// Placeholder line speed reported for the remote PTY.
const TTY_SPEED: u32 = 14400;

fn terminal_modes() -> [(Pty, u32); 3] {
    [
        (Pty::ECHO, 1),
        (Pty::TTY_OP_ISPEED, TTY_SPEED),
        (Pty::TTY_OP_OSPEED, TTY_SPEED),
    ]
}

impl RemoteSession {
    /// Start an interactive login shell on the remote side.
    ///
    /// The local terminal is raw for the lifetime of the shell and restored
    /// on every way out of this function.
    pub async fn shell(self) -> Result<()> {
        self.shell_with(Crossterm).await
    }

    pub(crate) async fn shell_with<T>(mut self, control: T) -> Result<()>
    where
        T: TerminalControl + Send,
    {
        let result = self.interactive_shell(control).await;
        let result = result.and_then(|exit| exit.into_shell_result("shell"));
        self.finish(result).await
    }

    async fn interactive_shell<T>(&mut self, control: T) -> Result<ExitOutcome>
    where
        T: TerminalControl + Send,
    {
        let (width, height) = terminal::terminal_size();
        let term = terminal::term_type();

        self.channel
            .request_pty(
                true,
                &term,
                width as u32,
                height as u32,
                0,
                0,
                &terminal_modes(),
            )
            .await
            .map_err(|e| ServoError::Ssh(format!("Failed to request PTY: {}", e)))?;

        self.channel
            .request_shell(true)
            .await
            .map_err(|e| ServoError::Ssh(format!("Failed to request shell: {}", e)))?;

        let mut resize = ResizeEvents::new()?;

        let _raw_guard = RawModeGuard::enter_with(control)?;

        let mut input = terminal::spawn_stdin_pump();
        let mut input_open = true;
        let mut stdout = tokio::io::stdout();
        let mut stderr = tokio::io::stderr();
        let mut exit = None;

        loop {
            tokio::select! {
                chunk = input.recv(), if input_open => {
                    match chunk {
                        Some(Ok(bytes)) => {
                            self.channel.data(&bytes[..]).await
                                .map_err(|e| ServoError::Ssh(format!("Failed to send data: {}", e)))?;
                        }
                        Some(Err(e)) => return Err(ServoError::Io(e)),
                        None => {
                            input_open = false;
                            let _ = self.channel.eof().await;
                        }
                    }
                }

                Some(()) = resize.recv() => {
                    let (width, height) = terminal::terminal_size();
                    if let Err(e) = self.channel.window_change(width as u32, height as u32, 0, 0).await {
                        tracing::debug!("window change: {}", e);
                    }
                }

                msg = self.channel.wait() => {
                    match msg {
                        Some(ChannelMsg::Data { data }) => {
                            stdout.write_all(&data).await?;
                            stdout.flush().await?;
                        }
                        Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                            stderr.write_all(&data).await?;
                            stderr.flush().await?;
                        }
                        Some(ChannelMsg::ExitStatus { exit_status }) => {
                            exit = Some(ExitOutcome::Code(exit_status));
                        }
                        Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                            exit = Some(ExitOutcome::from_signal(signal_name_str(&signal_name)));
                        }
                        Some(ChannelMsg::Close) | None => break,
                        _ => {}
                    }
                }
            }
        }

        finish_outcome(exit, &self.cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::test_server::TestServer;
    use tokio_util::sync::CancellationToken;

    /// Stands in for a real terminal, which test runs do not have.
    struct Headless;

    impl TerminalControl for Headless {
        fn enable_raw(&self) -> std::io::Result<()> {
            Ok(())
        }

        fn disable_raw(&self) -> std::io::Result<()> {
            Ok(())
        }
    }

    async fn shell_exiting_with(status: u32) -> (TestServer, Result<()>) {
        let server = TestServer::with_shell_status(status).await;
        let session = crate::ssh::connect(
            &server.servo("u"),
            &server.ssh_config(&[]),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let result = session.shell_with(Headless).await;
        (server, result)
    }

    #[tokio::test]
    async fn test_shell_requests_pty_then_shell() {
        let (server, result) = shell_exiting_with(0).await;
        assert!(result.is_ok());

        let events = server.events.snapshot();
        let pty = events.iter().position(|e| e.starts_with("tcp: pty ")).unwrap();
        let shell = events.iter().position(|e| e == "tcp: shell").unwrap();
        assert!(pty < shell);
    }

    #[tokio::test]
    async fn test_shell_interrupt_status_is_clean() {
        let (_server, result) = shell_exiting_with(130).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_shell_failure_status_is_error() {
        let (_server, result) = shell_exiting_with(1).await;
        assert!(matches!(
            result,
            Err(ServoError::CommandFailed { status: 1, .. })
        ));
    }

    #[test]
    fn test_terminal_modes_enable_echo() {
        let modes = terminal_modes();
        assert!(modes.iter().any(|(m, v)| matches!(m, Pty::ECHO) && *v == 1));
        assert!(modes
            .iter()
            .any(|(m, v)| matches!(m, Pty::TTY_OP_ISPEED) && *v == TTY_SPEED));
        assert!(modes
            .iter()
            .any(|(m, v)| matches!(m, Pty::TTY_OP_OSPEED) && *v == TTY_SPEED));
    }
}
