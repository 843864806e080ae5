//! ipcbuf: measure how much an IPC channel buffers before a non-blocking
//! write would block.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ipcbuf_core::IpcbufConfig;

mod cli;
mod report;
mod session;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let opts = cli::Cli::parse().into_options()?;

    let config = IpcbufConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        IpcbufConfig::default()
    });
    tracing::debug!(path = %IpcbufConfig::file_path().display(), "config resolved");

    session::run(&opts, &config)
}
