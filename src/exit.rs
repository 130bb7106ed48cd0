//! Normalized process exit outcomes.
//!
//! SSH reports either an `exit-status` or an `exit-signal`; local subprocesses
//! report a code or a terminating signal. Both collapse onto a single numeric
//! status using the shell convention of `128 + signal number`, so callers can
//! apply one rule regardless of where the process ran.

use crate::error::{Result, ServoError};

/// Conventional status of a process interrupted by SIGINT.
pub const INTERRUPTED: u32 = 130;

const SIGNAL_BASE: u32 = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    Code(u32),
    /// Terminated by a signal. `name` is as reported (`INT`, `SIGTERM`, ...).
    Signal { name: String, code: u32 },
    /// The process went away without reporting how.
    Missing,
}

impl ExitOutcome {
    pub fn from_signal(name: &str) -> Self {
        ExitOutcome::Signal {
            name: name.to_string(),
            code: SIGNAL_BASE + signal_number(name).unwrap_or(0),
        }
    }

    pub fn status(&self) -> Option<u32> {
        match self {
            ExitOutcome::Code(code) => Some(*code),
            ExitOutcome::Signal { code, .. } => Some(*code),
            ExitOutcome::Missing => None,
        }
    }

    pub fn success(&self) -> bool {
        self.status() == Some(0)
    }

    /// Any non-zero status is a generic failure of `command`.
    pub fn into_command_result(self, command: &str) -> Result<()> {
        match self.status() {
            Some(0) => Ok(()),
            Some(status) => Err(ServoError::CommandFailed {
                command: command.to_string(),
                status,
            }),
            None => Err(ServoError::NoExitStatus {
                command: command.to_string(),
            }),
        }
    }

    /// Like [`into_command_result`](Self::into_command_result), but status 130
    /// counts as a clean exit.
    ///
    /// This also accepts a shell killed by SIGINT, which is indistinguishable
    /// from one the user left with an interrupt.
    pub fn into_shell_result(self, command: &str) -> Result<()> {
        if self.status() == Some(INTERRUPTED) {
            tracing::debug!("shell exited with status {}, treating as clean exit", INTERRUPTED);
            return Ok(());
        }
        self.into_command_result(command)
    }
}

impl From<std::process::ExitStatus> for ExitOutcome {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitOutcome::Code(code as u32);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signo) = status.signal() {
                let name = nix::sys::signal::Signal::try_from(signo)
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_else(|_| signo.to_string());
                return ExitOutcome::Signal {
                    name,
                    code: SIGNAL_BASE + signo as u32,
                };
            }
        }

        ExitOutcome::Missing
    }
}

impl From<portable_pty::ExitStatus> for ExitOutcome {
    fn from(status: portable_pty::ExitStatus) -> Self {
        match status.signal() {
            Some(desc) => ExitOutcome::from_signal(signal_name_from_description(desc)),
            None => ExitOutcome::Code(status.exit_code()),
        }
    }
}

/// portable-pty reports signals as `strsignal(3)` text ("Interrupt"), not names.
fn signal_name_from_description(desc: &str) -> &str {
    match desc.trim() {
        "Hangup" => "HUP",
        "Interrupt" => "INT",
        "Quit" => "QUIT",
        "Aborted" => "ABRT",
        "Killed" => "KILL",
        "Broken pipe" => "PIPE",
        "Terminated" => "TERM",
        "Segmentation fault" => "SEGV",
        other => other,
    }
}

/// Signal number for a name with or without the `SIG` prefix.
#[cfg(unix)]
fn signal_number(name: &str) -> Option<u32> {
    use std::str::FromStr;

    let upper = name.trim().to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };
    nix::sys::signal::Signal::from_str(&full)
        .ok()
        .map(|sig| sig as i32 as u32)
}

#[cfg(not(unix))]
fn signal_number(_name: &str) -> Option<u32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_success() {
        assert!(ExitOutcome::Code(0).success());
        assert!(ExitOutcome::Code(0).into_command_result("ps").is_ok());
    }

    #[test]
    fn test_nonzero_is_generic_failure() {
        let err = ExitOutcome::Code(2).into_command_result("docker-compose ps").unwrap_err();
        assert!(matches!(err, ServoError::CommandFailed { status: 2, .. }));
    }

    #[test]
    fn test_missing_status_is_not_a_code() {
        let err = ExitOutcome::Missing.into_command_result("docker-compose ps").unwrap_err();
        assert!(matches!(err, ServoError::NoExitStatus { ref command } if command == "docker-compose ps"));
        assert!(matches!(
            ExitOutcome::Missing.into_shell_result("shell"),
            Err(ServoError::NoExitStatus { .. })
        ));
    }

    #[test]
    fn test_shell_interrupt_status_is_clean() {
        assert!(ExitOutcome::Code(130).into_shell_result("shell").is_ok());
        assert!(ExitOutcome::Code(0).into_shell_result("shell").is_ok());
        assert!(ExitOutcome::Code(1).into_shell_result("shell").is_err());
        assert!(ExitOutcome::Code(131).into_shell_result("shell").is_err());
        assert!(ExitOutcome::Missing.into_shell_result("shell").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_normalization() {
        assert_eq!(ExitOutcome::from_signal("INT").status(), Some(130));
        assert_eq!(ExitOutcome::from_signal("SIGTERM").status(), Some(143));
        assert_eq!(ExitOutcome::from_signal("kill").status(), Some(137));
        assert_eq!(ExitOutcome::from_signal("NOT-A-SIGNAL").status(), Some(128));
    }

    #[cfg(unix)]
    #[test]
    fn test_sigint_shell_is_clean() {
        // Killed-by-SIGINT and exit 130 are the same outcome.
        assert!(ExitOutcome::from_signal("INT").into_shell_result("shell").is_ok());
        assert!(ExitOutcome::from_signal("TERM").into_shell_result("shell").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_pty_signal_descriptions() {
        assert_eq!(signal_name_from_description("Interrupt"), "INT");
        assert_eq!(
            ExitOutcome::from_signal(signal_name_from_description("Terminated")).status(),
            Some(143)
        );
        assert_eq!(signal_name_from_description("SIGUSR2"), "SIGUSR2");
    }

    #[cfg(unix)]
    #[test]
    fn test_from_process_exit_status() {
        use std::os::unix::process::ExitStatusExt;

        let exited = std::process::ExitStatus::from_raw(3 << 8);
        assert_eq!(ExitOutcome::from(exited), ExitOutcome::Code(3));

        let killed = std::process::ExitStatus::from_raw(2);
        let outcome = ExitOutcome::from(killed);
        assert_eq!(outcome.status(), Some(130));
        assert!(matches!(outcome, ExitOutcome::Signal { ref name, .. } if name == "SIGINT"));
    }
}
