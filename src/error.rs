use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("no such servo {0:?}")]
    NoSuchServo(String),

    #[error("no driver for servo {name:?} (type {kind:?})")]
    NoDriver { name: String, kind: String },

    #[error("invalid bastion {0:?}: expected user@host[:port]")]
    InvalidBastion(String),

    #[error("known hosts: {0}")]
    KnownHosts(String),

    #[error("SSH connection error: {0}")]
    Ssh(String),

    /// Non-zero exit from a remote command or local CLI.
    #[error("command {command:?} failed with exit status {status}")]
    CommandFailed { command: String, status: u32 },

    #[error("command {command:?} exited without status")]
    NoExitStatus { command: String },

    #[error("{0}")]
    Terminal(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("SSH protocol error: {0}")]
    SshProtocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    SshKeys(#[from] russh_keys::Error),
}

impl ServoError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ServoError::Cancelled)
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        if self.is_cancelled() {
            crate::exit::INTERRUPTED as i32
        } else {
            1
        }
    }
}

pub type Result<T> = std::result::Result<T, ServoError>;
