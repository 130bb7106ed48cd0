//! Kubernetes servos, driven through the local `kubectl` binary.

use std::path::PathBuf;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::ServoDriver;
use crate::config::resolve_kubectl;
use crate::error::{Result, ServoError};
use crate::exit::ExitOutcome;
use crate::servo::{LogsOptions, Servo};

const SERVO_CONFIG_PATH: &str = "/servo/config.yaml";
const SHELL: &str = "/bin/bash";

pub struct KubernetesDriver {
    servo: Servo,
    kubectl: Option<String>,
    cancel: CancellationToken,
}

impl KubernetesDriver {
    pub fn new(servo: Servo, kubectl: Option<String>, cancel: CancellationToken) -> Self {
        Self {
            servo,
            kubectl,
            cancel,
        }
    }

    fn args(&self, rest: &[&str]) -> Vec<String> {
        let mut args = vec!["-n".to_string(), self.servo.namespace.clone()];
        args.extend(rest.iter().map(|s| s.to_string()));
        args
    }

    fn deployments(&self) -> String {
        format!("deployments/{}", self.servo.deployment)
    }

    fn deployment(&self) -> String {
        format!("deployment/{}", self.servo.deployment)
    }

    pub fn status_args(&self) -> Vec<String> {
        self.args(&["describe", &self.deployments()])
    }

    pub fn start_args(&self) -> Vec<String> {
        self.args(&["scale", "--replicas=1", &self.deployments()])
    }

    pub fn stop_args(&self) -> Vec<String> {
        self.args(&["scale", "--replicas=0", &self.deployments()])
    }

    pub fn restart_args(&self) -> Vec<String> {
        self.args(&["rollout", "restart", &self.deployment()])
    }

    pub fn logs_args(&self, options: &LogsOptions) -> Vec<String> {
        let mut args = self.args(&["logs", &self.deployments()]);
        // kubectl already shows everything without --tail
        if !options.lines.is_empty() && options.lines != "all" {
            args.push(format!("--tail={}", options.lines));
        }
        if options.follow {
            args.push("--follow".to_string());
        }
        if options.timestamps {
            args.push("--timestamps".to_string());
        }
        args
    }

    pub fn config_args(&self) -> Vec<String> {
        self.args(&["exec", &self.deployment(), "--", "cat", SERVO_CONFIG_PATH])
    }

    pub fn shell_args(&self) -> Vec<String> {
        self.args(&["exec", "-it", &self.deployment(), "--", SHELL])
    }

    fn kubectl(&self) -> Result<PathBuf> {
        resolve_kubectl(self.kubectl.as_deref())
    }

    fn describe(args: &[String]) -> String {
        format!("kubectl {}", args.join(" "))
    }

    /// Run kubectl with stdio wired straight to the terminal.
    async fn run(&self, args: Vec<String>) -> Result<()> {
        let command_line = Self::describe(&args);
        tracing::info!("{}: {}", self.servo.name, command_line);

        let mut child = Command::new(self.kubectl()?)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = self.cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(ServoError::Cancelled);
            }
        };

        ExitOutcome::from(status).into_command_result(&command_line)
    }

    /// Run kubectl and collect its output.
    async fn capture(&self, args: Vec<String>) -> Result<Output> {
        let command_line = Self::describe(&args);
        tracing::debug!("{}: {}", self.servo.name, command_line);

        let output = Command::new(self.kubectl()?)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            output = output => output?,
            _ = self.cancel.cancelled() => return Err(ServoError::Cancelled),
        };

        if !output.status.success() {
            tracing::debug!(
                "{} stderr: {}",
                command_line,
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        ExitOutcome::from(output.status).into_command_result(&command_line)?;
        Ok(output)
    }
}

#[async_trait]
impl ServoDriver for KubernetesDriver {
    async fn status(&self) -> Result<()> {
        self.run(self.status_args()).await
    }

    async fn start(&self) -> Result<()> {
        self.run(self.start_args()).await
    }

    async fn stop(&self) -> Result<()> {
        self.run(self.stop_args()).await
    }

    async fn restart(&self) -> Result<()> {
        self.run(self.restart_args()).await
    }

    async fn logs(&self, options: &LogsOptions) -> Result<()> {
        self.run(self.logs_args(options)).await
    }

    async fn config(&self) -> Result<()> {
        let output = self.capture(self.config_args()).await?;
        crate::output::print_yaml(&output.stdout)
    }

    async fn shell(&self) -> Result<()> {
        let kubectl = self.kubectl()?;
        tracing::info!("{}: {}", self.servo.name, Self::describe(&self.shell_args()));
        crate::pty::run_interactive(&kubectl, &self.shell_args(), &self.cancel).await
    }
}
