pub mod commands;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::error::Result;
use crate::servo::LogsOptions;
use commands::servo::Operation;

#[derive(Parser)]
#[command(name = "servoctl")]
#[command(version)]
#[command(about = "Manage remotely deployed servos")]
#[command(long_about = "Check, start, stop and inspect servos running under docker-compose \
(over SSH, optionally through a bastion) or as Kubernetes deployments.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List configured servos
    List,

    /// Show servo status
    Status {
        /// Servo name (default: default_servo from config)
        servo: Option<String>,
    },

    /// Start a servo
    Start {
        /// Servo name (default: default_servo from config)
        servo: Option<String>,
    },

    /// Stop a servo
    Stop {
        /// Servo name (default: default_servo from config)
        servo: Option<String>,
    },

    /// Restart a servo
    Restart {
        /// Servo name (default: default_servo from config)
        servo: Option<String>,
    },

    /// View servo logs
    Logs {
        /// Servo name (default: default_servo from config)
        servo: Option<String>,

        /// Follow mode: keep streaming new lines (like tail -f)
        #[arg(short, long)]
        follow: bool,

        /// Prefix each line with its timestamp
        #[arg(short, long)]
        timestamps: bool,

        /// Number of lines to show, or "all"
        #[arg(short = 'n', long, default_value = "all")]
        lines: String,
    },

    /// Print the servo's config.yaml
    Config {
        /// Servo name (default: default_servo from config)
        servo: Option<String>,
    },

    /// Open an interactive shell on the servo
    Shell {
        /// Servo name (default: default_servo from config)
        servo: Option<String>,
    },
}

impl Cli {
    pub async fn execute(self, cancel: CancellationToken) -> Result<()> {
        let config = AppConfig::load()?;

        let (servo, op) = match self.command {
            Commands::List => return commands::servo::list(&config),
            Commands::Status { servo } => (servo, Operation::Status),
            Commands::Start { servo } => (servo, Operation::Start),
            Commands::Stop { servo } => (servo, Operation::Stop),
            Commands::Restart { servo } => (servo, Operation::Restart),
            Commands::Logs {
                servo,
                follow,
                timestamps,
                lines,
            } => (
                servo,
                Operation::Logs(LogsOptions {
                    follow,
                    timestamps,
                    lines,
                }),
            ),
            Commands::Config { servo } => (servo, Operation::Config),
            Commands::Shell { servo } => (servo, Operation::Shell),
        };

        commands::servo::execute(&config, servo.as_deref(), op, cancel).await
    }
}
