//! docker-compose servos, driven over SSH.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::ServoDriver;
use crate::error::Result;
use crate::servo::{LogsOptions, Servo};
use crate::ssh::{self, SshConfig};

/// Build the shell line run on the servo host, entering `path` first when set.
pub fn compose_command(path: &str, command: &str) -> String {
    if path.is_empty() {
        command.to_string()
    } else {
        format!("cd {}&& {}", path, command)
    }
}

pub fn logs_command(options: &LogsOptions) -> String {
    let mut command = format!("docker-compose logs --tail {}", options.lines);
    if options.follow {
        command.push_str(" --follow");
    }
    if options.timestamps {
        command.push_str(" --timestamps");
    }
    command
}

pub struct ComposeDriver {
    servo: Servo,
    ssh: SshConfig,
    cancel: CancellationToken,
}

impl ComposeDriver {
    pub fn new(servo: Servo, ssh: SshConfig, cancel: CancellationToken) -> Self {
        Self { servo, ssh, cancel }
    }

    fn command(&self, command: &str) -> String {
        compose_command(&self.servo.path, command)
    }

    async fn session(&self) -> Result<ssh::RemoteSession> {
        ssh::connect(&self.servo, &self.ssh, self.cancel.clone()).await
    }

    async fn run(&self, command: &str) -> Result<()> {
        let command = self.command(command);
        tracing::info!("{}: {}", self.servo.name, command);

        let session = self.session().await?;
        session.run(&command).await?.into_command_result(&command)
    }
}

#[async_trait]
impl ServoDriver for ComposeDriver {
    async fn status(&self) -> Result<()> {
        self.run("docker-compose ps").await
    }

    async fn start(&self) -> Result<()> {
        self.run("docker-compose up -d").await
    }

    async fn stop(&self) -> Result<()> {
        self.run("docker-compose down").await
    }

    async fn restart(&self) -> Result<()> {
        self.run("docker-compose down && docker-compose up -d").await
    }

    async fn logs(&self, options: &LogsOptions) -> Result<()> {
        self.run(&logs_command(options)).await
    }

    async fn config(&self) -> Result<()> {
        let command = self.command("cat config.yaml");
        let session = self.session().await?;
        let output = session.capture(&command).await?;

        if !output.exit.success() {
            tracing::debug!(
                "{} stderr: {}",
                command,
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        output.exit.into_command_result(&command)?;

        crate::output::print_yaml(&output.stdout)
    }

    async fn shell(&self) -> Result<()> {
        self.session().await?.shell().await
    }
}
