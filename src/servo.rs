//! Servo records and per-call request parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServoError};

pub const DEFAULT_SSH_PORT: u16 = 22;

/// Deployment flavour of a servo. Selects the driver and which fields of
/// [`Servo`] are meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServoType {
    DockerCompose,
    Kubernetes,
    /// Kept verbatim so driver selection can name it in the error.
    Unknown(String),
}

impl ServoType {
    pub fn as_str(&self) -> &str {
        match self {
            ServoType::DockerCompose => "docker-compose",
            ServoType::Kubernetes => "kubernetes",
            ServoType::Unknown(s) => s,
        }
    }
}

impl From<String> for ServoType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "docker-compose" => ServoType::DockerCompose,
            "kubernetes" => ServoType::Kubernetes,
            _ => ServoType::Unknown(s),
        }
    }
}

impl From<ServoType> for String {
    fn from(t: ServoType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for ServoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and connection profile for one remote servo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Servo {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ServoType,

    // docker-compose
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bastion: String,

    // kubernetes
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub deployment: String,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl Servo {
    /// A docker-compose servo reached directly over SSH.
    #[cfg(test)]
    pub fn compose(name: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ServoType::DockerCompose,
            user: user.into(),
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            path: String::new(),
            bastion: String::new(),
            namespace: String::new(),
            deployment: String::new(),
        }
    }

    #[cfg(test)]
    pub fn kubernetes(
        name: impl Into<String>,
        namespace: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ServoType::Kubernetes,
            user: String::new(),
            host: String::new(),
            port: DEFAULT_SSH_PORT,
            path: String::new(),
            bastion: String::new(),
            namespace: namespace.into(),
            deployment: deployment.into(),
        }
    }

    /// `host:port` of the compose target.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parsed bastion, if one is configured.
    pub fn bastion(&self) -> Result<Option<Bastion>> {
        if self.bastion.is_empty() {
            return Ok(None);
        }
        Bastion::parse(&self.bastion).map(Some)
    }
}

/// An intermediate SSH hop, parsed from `user@host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bastion {
    pub user: String,
    pub host: String,
    pub port: u16,
}

impl Bastion {
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || ServoError::InvalidBastion(value.to_string());

        let (user, addr) = value.split_once('@').ok_or_else(invalid)?;
        if user.is_empty() || addr.is_empty() {
            return Err(invalid());
        }

        let (host, port) = match addr.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (addr, DEFAULT_SSH_PORT),
        };
        if host.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            user: user.to_string(),
            host: host.to_string(),
            port,
        })
    }

}

impl fmt::Display for Bastion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Parameters of a single `logs` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogsOptions {
    pub follow: bool,
    pub timestamps: bool,
    /// Line count, or `"all"`.
    pub lines: String,
}

impl Default for LogsOptions {
    fn default() -> Self {
        Self {
            follow: false,
            timestamps: false,
            lines: "all".to_string(),
        }
    }
}
