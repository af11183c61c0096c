//! stackherd CLI entry point.

use std::path::Path;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use stackherd::cli::Cli;
use stackherd::config::MonitorConfig;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // Configuration failure is fatal; everything past this point degrades
    // per stack instead of terminating the process.
    let config = MonitorConfig::load(&cli.config)?;
    init_tracing(config.settings.log_file.as_deref(), cli.debug)?;

    cli.execute(config).await
}

fn init_tracing(log_file: Option<&Path>, debug: bool) -> Result<()> {
    let default_directives = if debug { "debug" } else { "info" };
    let filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_directives.into()),
    );

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .init();

    Ok(())
}
