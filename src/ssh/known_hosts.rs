//! Host-key verification against an OpenSSH known_hosts file.

use std::path::{Path, PathBuf};

use crate::error::{Result, ServoError};

/// A known_hosts file that has been read and checked line by line.
///
/// Loading is strict: a file that cannot be read, or any entry that does not
/// parse, fails the whole connection attempt before anything is dialed.
#[derive(Debug, Clone)]
pub struct KnownHosts {
    path: PathBuf,
    entries: usize,
}

impl KnownHosts {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServoError::KnownHosts(format!("cannot read {}: {}", path.display(), e))
        })?;

        let mut entries = 0;
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            parse_entry(line).map_err(|reason| {
                ServoError::KnownHosts(format!("{}:{}: {}", path.display(), idx + 1, reason))
            })?;
            entries += 1;
        }

        tracing::debug!("loaded {} known host entries from {}", entries, path.display());
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    /// `Ok(false)` for a host with no entry; a recorded key that differs is
    /// an error.
    pub fn verify(&self, host: &str, port: u16, key: &russh_keys::PublicKey) -> Result<bool> {
        match russh_keys::check_known_hosts_path(host, port, key, &self.path) {
            Ok(known) => {
                if !known {
                    tracing::warn!("host key for {}:{} is not in {}", host, port, self.path.display());
                }
                Ok(known)
            }
            Err(russh_keys::Error::KeyChanged { line }) => Err(ServoError::KnownHosts(format!(
                "host key for {}:{} does not match {}:{}",
                host,
                port,
                self.path.display(),
                line
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

/// Checks `[@marker] hosts keytype base64-key [comment]`.
fn parse_entry(line: &str) -> std::result::Result<(), String> {
    let mut fields = line.split_whitespace().peekable();

    if fields.peek().is_some_and(|f| f.starts_with('@')) {
        fields.next();
    }

    let _hosts = fields.next().ok_or("missing host pattern")?;
    let _key_type = fields.next().ok_or("missing key type")?;
    let key = fields.next().ok_or("missing key")?;

    russh_keys::parse_public_key_base64(key)
        .map(|_| ())
        .map_err(|e| format!("invalid key: {}", e))
}
