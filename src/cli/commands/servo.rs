use console::style;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::driver::driver_for;
use crate::error::Result;
use crate::servo::{LogsOptions, Servo, ServoType};

/// A lifecycle call against one servo.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Status,
    Start,
    Stop,
    Restart,
    Logs(LogsOptions),
    Config,
    Shell,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Status => "status",
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Restart => "restart",
            Operation::Logs(_) => "logs",
            Operation::Config => "config",
            Operation::Shell => "shell",
        }
    }
}

pub async fn execute(
    config: &AppConfig,
    name: Option<&str>,
    op: Operation,
    cancel: CancellationToken,
) -> Result<()> {
    let servo = config.resolve_servo(name)?;
    let driver = driver_for(servo, config, cancel)?;

    tracing::debug!("{} {} ({})", op.name(), servo.name, servo.kind);

    match op {
        Operation::Status => driver.status().await,
        Operation::Start => driver.start().await,
        Operation::Stop => driver.stop().await,
        Operation::Restart => driver.restart().await,
        Operation::Logs(options) => driver.logs(&options).await,
        Operation::Config => driver.config().await,
        Operation::Shell => driver.shell().await,
    }
}

pub fn list(config: &AppConfig) -> Result<()> {
    if config.servos.is_empty() {
        println!("{}", style("No servos configured.").dim());
        return Ok(());
    }

    println!("{}", style("Servos").bold().cyan());
    println!();
    for servo in &config.servos {
        let marker = if config.default_servo.as_deref() == Some(servo.name.as_str()) {
            style("*").green().bold()
        } else {
            style(" ")
        };
        println!(
            "  {} {:<20} {:<16} {}",
            marker,
            style(&servo.name).white().bold(),
            style(servo.kind.as_str()).yellow(),
            style(target(servo)).dim()
        );
    }
    Ok(())
}

/// Where a servo lives, for display.
fn target(servo: &Servo) -> String {
    match &servo.kind {
        ServoType::DockerCompose => {
            let mut target = format!("{}@{}", servo.user, servo.address());
            if !servo.path.is_empty() {
                target.push(':');
                target.push_str(&servo.path);
            }
            if let Ok(Some(bastion)) = servo.bastion() {
                target.push_str(&format!(" via {}", bastion));
            }
            target
        }
        ServoType::Kubernetes => format!("{}/{}", servo.namespace, servo.deployment),
        ServoType::Unknown(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServoError;

    #[test]
    fn test_target_display() {
        let mut compose = Servo::compose("dev", "u", "h");
        compose.path = "/app".into();
        compose.bastion = "jump@gw".into();
        assert_eq!(target(&compose), "u@h:22:/app via jump@gw:22");

        assert_eq!(target(&Servo::kubernetes("k", "ns", "dep")), "ns/dep");
    }

    #[tokio::test]
    async fn test_execute_unknown_servo() {
        let config = AppConfig::default();
        let err = execute(&config, Some("ghost"), Operation::Status, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServoError::NoSuchServo(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_execute_unknown_type_has_no_driver() {
        let mut servo = Servo::compose("edge", "u", "h");
        servo.kind = ServoType::Unknown("nomad".into());
        let config = AppConfig {
            servos: vec![servo],
            ..Default::default()
        };

        let err = execute(&config, Some("edge"), Operation::Start, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServoError::NoDriver { .. }));
    }

    #[test]
    fn test_list_empty() {
        assert!(list(&AppConfig::default()).is_ok());
    }
}
