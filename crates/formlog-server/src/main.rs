//! formlog binary.
//!
//! Opens the record store once and exposes it through the HTTP adapter
//! (`serve`) or the stdio pipe adapter (`worker`). Logs go to stderr so the
//! pipe protocol owns stdout.

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use formlog::Dispatcher;
use formlog_core::{EventSink, TracingSink};
use formlog_transport::{http, pipe};
use tracing::{info, warn};

use crate::cli::{Cli, Command};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,formlog=debug"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = ?err, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.config();
    let events: Arc<dyn EventSink> = Arc::new(TracingSink);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.store.data_dir.display(),
        "starting formlog"
    );

    let dispatcher = Dispatcher::open(&config.store, events)
        .await
        .with_context(|| {
            format!(
                "failed to open record store in {}",
                config.store.data_dir.display()
            )
        })?;

    match cli.command {
        Command::Serve(_) => {
            let listener = http::bind(&config.http).await?;
            http::serve(listener, dispatcher, &config.http, shutdown_signal())
                .await
                .context("http adapter failed")?;
        }
        Command::Worker => {
            let stats = pipe::run_stdio(dispatcher)
                .await
                .context("pipe adapter failed")?;
            info!(
                received = stats.received,
                answered = stats.answered,
                "worker finished"
            );
        }
        Command::Info => {
            let info = dispatcher
                .store()
                .info()
                .await
                .context("failed to read log info")?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}
