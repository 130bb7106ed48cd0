//! Local pseudo-terminal bridge.
//!
//! Runs a local CLI (here `kubectl exec -it`) attached to a freshly allocated
//! PTY so it behaves as if it owned the user's terminal, and shuttles bytes
//! between that PTY and the real terminal until the process exits.

use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ServoError};
use crate::exit::ExitOutcome;
use crate::terminal::{self, RawModeGuard, ResizeEvents};

/// How long to keep draining output after the child has exited.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

fn pty_error(context: &str, e: impl std::fmt::Display) -> ServoError {
    ServoError::Terminal(format!("{}: {}", context, e))
}

fn current_size() -> PtySize {
    let (cols, rows) = terminal::terminal_size();
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn resize_to_terminal(master: &dyn MasterPty) {
    if let Err(e) = master.resize(current_size()) {
        tracing::debug!("pty resize: {}", e);
    }
}

/// EIO from the master is how Linux reports that the slave side closed.
fn is_end_of_output(e: &std::io::Error) -> bool {
    #[cfg(unix)]
    if e.raw_os_error() == Some(nix::errno::Errno::EIO as i32) {
        return true;
    }
    e.kind() == std::io::ErrorKind::BrokenPipe
}

/// Run `program args..` under a new local PTY wired to this terminal.
pub async fn run_interactive(program: &Path, args: &[String], cancel: &CancellationToken) -> Result<()> {
    let command_line = format!("{} {}", program.display(), args.join(" "));
    tracing::debug!("pty exec: {}", command_line);

    let pair = native_pty_system()
        .openpty(current_size())
        .map_err(|e| pty_error("open pty", e))?;

    let mut cmd = CommandBuilder::new(program);
    cmd.args(args);
    if let Ok(cwd) = std::env::current_dir() {
        cmd.cwd(cwd);
    }

    let mut child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| pty_error("start command", e))?;
    // Only the child may hold the slave, or reads never see it close.
    drop(pair.slave);

    let master = pair.master;
    let mut killer = child.clone_killer();
    let reader = master
        .try_clone_reader()
        .map_err(|e| pty_error("pty reader", e))?;
    let writer = master
        .take_writer()
        .map_err(|e| pty_error("pty writer", e))?;

    let mut resize = ResizeEvents::new()?;
    resize_to_terminal(master.as_ref());

    let _raw_guard = match RawModeGuard::enter() {
        Ok(guard) => guard,
        Err(e) => {
            let _ = killer.kill();
            return Err(e);
        }
    };

    let mut input_errors = spawn_input_copy(writer);
    let mut output = tokio::task::spawn_blocking(move || copy_output(reader));
    let mut output_done = false;
    let mut wait = tokio::task::spawn_blocking(move || child.wait());

    let status = loop {
        tokio::select! {
            Some(()) = resize.recv() => resize_to_terminal(master.as_ref()),

            Some(e) = input_errors.recv() => {
                let _ = killer.kill();
                return Err(ServoError::Io(e));
            }

            copied = &mut output, if !output_done => {
                output_done = true;
                match copied {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        let _ = killer.kill();
                        return Err(ServoError::Io(e));
                    }
                    Err(e) => {
                        let _ = killer.kill();
                        return Err(pty_error("output copy", e));
                    }
                }
            }

            status = &mut wait => {
                break status
                    .map_err(|e| pty_error("wait for command", e))?
                    .map_err(ServoError::Io)?;
            }

            _ = cancel.cancelled() => {
                let _ = killer.kill();
                return Err(ServoError::Cancelled);
            }
        }
    };

    if !output_done {
        match tokio::time::timeout(DRAIN_TIMEOUT, &mut output).await {
            Ok(Ok(Err(e))) => return Err(ServoError::Io(e)),
            Ok(_) => {}
            Err(_) => tracing::debug!("pty output still open after exit, abandoning"),
        }
    }

    ExitOutcome::from(status).into_shell_result(&command_line)
}

/// Copy stdin into the PTY on a detached thread; the first failure is sent
/// back. The thread outlives the call if it is parked in a stdin read.
fn spawn_input_copy(mut writer: Box<dyn Write + Send>) -> mpsc::Receiver<std::io::Error> {
    let (tx, rx) = mpsc::channel(1);

    std::thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 1024];
        loop {
            let n = match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = tx.blocking_send(e);
                    break;
                }
            };
            if let Err(e) = writer.write_all(&buf[..n]).and_then(|_| writer.flush()) {
                if tx.is_closed() {
                    break;
                }
                let _ = tx.blocking_send(e);
                break;
            }
        }
    });

    rx
}

fn copy_output(mut reader: Box<dyn Read + Send>) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                stdout.write_all(&buf[..n])?;
                stdout.flush()?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) if is_end_of_output(&e) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}
