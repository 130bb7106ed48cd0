use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServoError};
use crate::servo::Servo;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub servos: Vec<Servo>,
    /// Servo used when a command is given no name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_servo: Option<String>,
    #[serde(default = "default_known_hosts")]
    pub known_hosts: String,
    /// Explicit path to kubectl; looked up on PATH when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubectl: Option<String>,
    #[serde(default = "default_keepalive")]
    pub ssh_keepalive_secs: u64,
}

fn default_known_hosts() -> String {
    "~/.ssh/known_hosts".to_string()
}

fn default_keepalive() -> u64 {
    15
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            servos: Vec::new(),
            default_servo: None,
            known_hosts: default_known_hosts(),
            kubectl: None,
            ssh_keepalive_secs: default_keepalive(),
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ServoError::Config("cannot determine home directory".to_string()))?;
        Ok(home.join(".config").join("servoctl"))
    }

    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("SERVOCTL_CONFIG") {
            return Ok(PathBuf::from(shellexpand::tilde(&path).as_ref()));
        }
        Ok(Self::config_dir()?.join("config.yaml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ServoError::Config(format!(
                "Config file not found: {}. Add a servo to it first.",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .map_err(|e| ServoError::Config(format!("Invalid config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject duplicate servo names and bastions that do not parse.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for servo in &self.servos {
            if !seen.insert(servo.name.as_str()) {
                return Err(ServoError::Config(format!(
                    "duplicate servo name {:?}",
                    servo.name
                )));
            }
            servo.bastion()?;
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&Servo> {
        self.servos
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ServoError::NoSuchServo(name.to_string()))
    }

    /// Look up `name`, or the configured default servo when none is given.
    pub fn resolve_servo(&self, name: Option<&str>) -> Result<&Servo> {
        match name.or(self.default_servo.as_deref()) {
            Some(name) => self.lookup(name),
            None => Err(ServoError::Config(
                "no servo given and no default_servo configured".to_string(),
            )),
        }
    }

    pub fn known_hosts_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.known_hosts).as_ref())
    }

    pub fn keepalive_interval(&self) -> Option<Duration> {
        match self.ssh_keepalive_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Resolve the kubectl binary, preferring an explicit path over PATH lookup.
pub fn resolve_kubectl(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(shellexpand::tilde(path).as_ref()));
    }
    which::which("kubectl")
        .map_err(|e| ServoError::Config(format!("kubectl not found on PATH: {}", e)))
}
