//! Pure Rust SSH transport for docker-compose servos.
//!
//! ## Modules
//!
//! - [`client`] - connection setup, bastion tunneling, agent auth
//! - [`known_hosts`] - host-key verification
//! - [`exec`] - remote command execution
//! - [`pty`] - interactive shell sessions

pub mod client;
pub mod config;
mod exec;
pub mod known_hosts;
mod pty;
#[cfg(test)]
pub(crate) mod test_server;

pub use client::{connect, RemoteSession};
pub use config::SshConfig;

/// Check if SSH agent is running and accessible.
///
/// Verifies that SSH_AUTH_SOCK environment variable is set and the socket exists.
pub fn is_ssh_agent_running() -> bool {
    if let Ok(sock) = std::env::var("SSH_AUTH_SOCK") {
        std::path::Path::new(&sock).exists()
    } else {
        false
    }
}
