mod cli;
mod config;
mod error;
mod paths;
mod sampler;
mod sink;

use std::process::ExitCode;

use clap::Parser;
use container_stats::{StatsFetcher, UnixSocketClient};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::MonitorResult;
use crate::paths::LogPaths;
use crate::sampler::Sampler;
use crate::sink::JsonlSink;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> MonitorResult<()> {
    let config = cli.resolve().await?;

    // One client for the life of the process, handed to the fetcher.
    let client = UnixSocketClient::new(&config.socket_path)
        .with_api_version(&config.api_version)
        .with_timeout(config.request_timeout());
    let fetcher = StatsFetcher::new(client, config.retry_policy());
    info!(
        socket = %fetcher.source().socket_path().display(),
        api_version = %config.api_version,
        "runtime api client initialized"
    );

    let sampler = Sampler::new(
        fetcher,
        config.container.clone(),
        config.sample_interval(),
    );

    let paths = LogPaths::new(config.log_dir.clone());
    let mut sink = JsonlSink::open(paths.stats()).await?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    sampler.run(&mut sink, &cancel).await?;
    info!(log_dir = %paths.dir().display(), "monitoring stopped by user");
    Ok(())
}

/// Cancel `token` on the first SIGINT or SIGTERM.
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();

        tokio::select! {
            _ = recv_signal(&mut sigterm) => {
                info!("received SIGTERM, stopping");
            }
            _ = recv_signal(&mut sigint) => {
                info!("received SIGINT, stopping");
            }
        }
        token.cancel();
    });
}

/// Await a signal if registered, or pend forever if registration failed.
async fn recv_signal(sig: &mut Option<tokio::signal::unix::Signal>) {
    match sig {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending().await,
    }
}
