//! Local terminal state shared by both shell bridges.

use std::io::Read;

use tokio::sync::mpsc;

use crate::error::{Result, ServoError};

pub const DEFAULT_TERM: &str = "xterm-256color";

/// Raw/cooked switching of the controlling terminal.
pub trait TerminalControl {
    fn enable_raw(&self) -> std::io::Result<()>;
    fn disable_raw(&self) -> std::io::Result<()>;
}

/// The process's real terminal, driven through crossterm.
pub struct Crossterm;

impl TerminalControl for Crossterm {
    fn enable_raw(&self) -> std::io::Result<()> {
        crossterm::terminal::enable_raw_mode()
    }

    fn disable_raw(&self) -> std::io::Result<()> {
        crossterm::terminal::disable_raw_mode()
    }
}

/// RAII guard to restore terminal mode on drop.
///
/// Restoration happens exactly once, on whichever path drops the guard.
pub struct RawModeGuard<T: TerminalControl = Crossterm> {
    control: T,
}

impl RawModeGuard<Crossterm> {
    pub fn enter() -> Result<Self> {
        Self::enter_with(Crossterm)
    }
}

impl<T: TerminalControl> RawModeGuard<T> {
    pub fn enter_with(control: T) -> Result<Self> {
        control
            .enable_raw()
            .map_err(|e| ServoError::Terminal(format!("terminal make raw: {}", e)))?;
        Ok(Self { control })
    }
}

impl<T: TerminalControl> Drop for RawModeGuard<T> {
    fn drop(&mut self) {
        if let Err(e) = self.control.disable_raw() {
            tracing::warn!("failed to restore terminal mode: {}", e);
        }
    }
}

/// Current terminal size as `(columns, rows)`.
pub fn terminal_size() -> (u16, u16) {
    match crossterm::terminal::size() {
        Ok((0, _)) | Ok((_, 0)) | Err(_) => (80, 24),
        Ok(size) => size,
    }
}

/// `$TERM`, or a 256-colour xterm when the environment has none.
pub fn term_type() -> String {
    std::env::var("TERM")
        .ok()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TERM.to_string())
}

/// Terminal resize notifications, from SIGWINCH on unix.
pub struct ResizeEvents {
    #[cfg(unix)]
    signal: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ResizeEvents {
    pub fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let signal = signal(SignalKind::window_change())
            .map_err(|e| ServoError::Terminal(format!("watch terminal resize: {}", e)))?;
        Ok(Self { signal })
    }

    pub async fn recv(&mut self) -> Option<()> {
        self.signal.recv().await
    }
}

/// Without SIGWINCH the size is only read once, at startup.
#[cfg(not(unix))]
impl ResizeEvents {
    pub fn new() -> Result<Self> {
        Ok(Self {})
    }

    pub async fn recv(&mut self) -> Option<()> {
        std::future::pending().await
    }
}

/// Read stdin on a detached OS thread.
///
/// A blocking stdin read cannot be cancelled, so it must not live on the
/// runtime's blocking pool where it would stall shutdown. The thread ends on
/// EOF, on a read error (forwarded), or once the receiver is dropped.
pub fn spawn_stdin_pump() -> mpsc::Receiver<std::io::Result<Vec<u8>>> {
    let (tx, rx) = mpsc::channel(32);

    std::thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 1024];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(Ok(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = tx.blocking_send(Err(e));
                    break;
                }
            }
        }
    });

    rx
}
