mod cli;
mod config;
mod driver;
mod error;
mod exit;
mod output;
mod pty;
mod servo;
mod ssh;
mod terminal;

use clap::Parser;
use console::style;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "servoctl=debug"
    } else {
        "servoctl=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    if let Err(e) = cli.execute(cancel).await {
        if !e.is_cancelled() {
            eprintln!("{} {}", style("error:").red().bold(), e);
        }
        std::process::exit(e.exit_code());
    }
}
