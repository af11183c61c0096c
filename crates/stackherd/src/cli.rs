//! stackherd CLI.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use stackherd_compose::ComposeClient;
use tabled::{Table, Tabled};

use crate::config::MonitorConfig;
use crate::conflict::ConflictResolver;
use crate::engine::{CycleReport, EngineOptions, ReconcileEngine};
use crate::probe::HttpProbe;
use crate::report::StatusReporter;
use crate::shutdown::Shutdown;

/// stackherd - desired-state reconciliation for Docker Compose stacks
#[derive(Parser)]
#[command(name = "stackherd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to stack-config.yml
    #[arg(short, long, default_value = "stack-config.yml")]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// stackherd commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run a single reconciliation cycle
    Check,

    /// Show a read-only status snapshot
    Status,

    /// Reconcile continuously at the configured interval
    Monitor,
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "STACK")]
    stack: String,
    #[tabled(rename = "ACTION")]
    action: String,
    #[tabled(rename = "RESULT")]
    result: String,
}

impl Cli {
    /// Execute the CLI command against a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures outside a cycle (probe client
    /// construction); per-stack failures are caught inside the engine.
    pub async fn execute(self, config: MonitorConfig) -> Result<()> {
        let paths = config.paths(&self.config);
        let runtime = ComposeClient::new();
        let probe = HttpProbe::new()?;
        let resolver = ConflictResolver::new(config.settings.shared_services.clone());
        let options = EngineOptions {
            restart_delay: config.restart_delay(),
            ..EngineOptions::default()
        };
        let stacks = config.ordered_stacks();

        match self.command {
            Commands::Check => {
                let engine = ReconcileEngine::new(
                    runtime,
                    probe,
                    resolver,
                    paths,
                    options,
                    Shutdown::inert(),
                );
                let report = engine.run_cycle(&stacks).await;
                print_cycle(&report);
                Ok(())
            }

            Commands::Status => {
                let reporter = StatusReporter::new(
                    &runtime,
                    &probe,
                    &paths,
                    config.settings.proxy_dynamic_dir.clone(),
                );
                let report = reporter.snapshot(&stacks).await;
                println!("{}", report.render());
                Ok(())
            }

            Commands::Monitor => {
                let mut shutdown = Shutdown::listen();
                let engine = ReconcileEngine::new(
                    runtime,
                    probe,
                    resolver,
                    paths,
                    options,
                    shutdown.clone(),
                );
                let interval = config.check_interval();
                tracing::info!(interval_secs = interval.as_secs(), "Starting monitor loop");

                loop {
                    let report = engine.run_cycle(&stacks).await;
                    if report.interrupted || shutdown.requested() {
                        break;
                    }
                    tokio::select! {
                        () = tokio::time::sleep(interval) => {}
                        () = shutdown.wait() => break,
                    }
                }

                tracing::info!("Monitor stopped");
                Ok(())
            }
        }
    }
}

fn print_cycle(report: &CycleReport) {
    if report.outcomes.is_empty() {
        println!("No stacks configured");
        return;
    }

    let rows: Vec<OutcomeRow> = report
        .outcomes
        .iter()
        .map(|outcome| OutcomeRow {
            stack: outcome.stack.clone(),
            action: outcome.decision.action.to_string(),
            result: if outcome.escalated {
                format!("{} (escalated)", outcome.decision.reason)
            } else {
                outcome.decision.reason.clone()
            },
        })
        .collect();

    println!("{}", Table::new(rows));

    if report.interrupted {
        println!("Cycle interrupted before all stacks were processed");
    }
}
