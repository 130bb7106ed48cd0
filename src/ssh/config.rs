//! SSH connection configuration.

use std::path::PathBuf;
use std::time::Duration;

/// How each hop proves the user's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Keys held by the running ssh-agent.
    Agent,
    /// The `none` method, for in-process test servers.
    #[cfg(test)]
    Anonymous,
}

/// Settings shared by every hop of a compose connection.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// known_hosts file used to verify every host key, bastion included.
    pub known_hosts: PathBuf,

    /// Keep-alive interval; `None` disables keep-alives.
    pub keepalive_interval: Option<Duration>,

    pub auth: AuthMethod,
}

impl SshConfig {
    pub fn new(known_hosts: impl Into<PathBuf>) -> Self {
        Self {
            known_hosts: known_hosts.into(),
            keepalive_interval: Some(Duration::from_secs(15)),
            auth: AuthMethod::Agent,
        }
    }

    pub(crate) fn russh_config(&self) -> russh::client::Config {
        russh::client::Config {
            // Follow-mode logs may sit idle for a long time
            inactivity_timeout: None,
            keepalive_interval: self.keepalive_interval,
            // Allow up to 4 missed keep-alives before disconnect
            keepalive_max: 4,
            ..Default::default()
        }
    }
}

impl From<&crate::config::AppConfig> for SshConfig {
    fn from(app_config: &crate::config::AppConfig) -> Self {
        Self {
            keepalive_interval: app_config.keepalive_interval(),
            ..Self::new(app_config.known_hosts_path())
        }
    }
}
