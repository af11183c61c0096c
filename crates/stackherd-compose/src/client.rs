//! `docker compose` CLI client.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use stackherd_common::{HerdError, HerdResult};

use crate::runtime::{ObservedState, StackRuntime};

/// Boundary timeout for a single `docker compose` invocation. The CLI has no
/// intrinsic timeout, so every call is wrapped with one here.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for a `docker compose` installation.
///
/// Every invocation runs with the compose file's directory as working
/// directory, mirroring how the files are written (relative bind mounts,
/// project name from the directory).
#[derive(Debug, Clone)]
pub struct ComposeClient {
    timeout: Duration,
}

impl ComposeClient {
    /// Create a client with the default command timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: COMMAND_TIMEOUT,
        }
    }

    /// Create a client with a custom command timeout.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run(&self, compose_file: &Path, args: &[&str]) -> HerdResult<Output> {
        let dir = compose_file.parent().ok_or_else(|| HerdError::Runtime {
            message: format!("compose file has no parent directory: {}", compose_file.display()),
        })?;

        tracing::debug!(file = %compose_file.display(), ?args, "Invoking docker compose");

        let mut command = tokio::process::Command::new("docker");
        command
            .arg("compose")
            .arg("-f")
            .arg(compose_file)
            .args(args)
            .current_dir(dir);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| HerdError::Runtime {
                message: format!(
                    "docker compose {} timed out after {}s",
                    args.join(" "),
                    self.timeout.as_secs()
                ),
            })?
            .map_err(|e| HerdError::Runtime {
                message: format!("failed to execute docker compose: {e}"),
            })?;

        Ok(output)
    }

    async fn run_checked(&self, compose_file: &Path, args: &[&str]) -> HerdResult<String> {
        let output = self.run(compose_file, args).await?;
        if !output.status.success() {
            return Err(HerdError::CommandFailed {
                command: format!("docker compose {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for ComposeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StackRuntime for ComposeClient {
    async fn expected_containers(&self, compose_file: &Path) -> HerdResult<Vec<String>> {
        let stdout = self
            .run_checked(compose_file, &["config", "--format", "json"])
            .await?;
        let fallback_project = directory_name(compose_file);
        parse_config_output(&stdout, &fallback_project)
    }

    async fn observed_state(&self, compose_file: &Path) -> HerdResult<ObservedState> {
        let stdout = self
            .run_checked(compose_file, &["ps", "--all", "--format", "json"])
            .await?;
        parse_ps_output(&stdout)
    }

    async fn up(&self, compose_file: &Path) -> HerdResult<()> {
        tracing::info!(file = %compose_file.display(), "Bringing stack up");
        self.run_checked(compose_file, &["up", "-d"]).await?;
        Ok(())
    }

    async fn down(&self, compose_file: &Path) -> HerdResult<()> {
        tracing::info!(file = %compose_file.display(), "Bringing stack down");
        self.run_checked(compose_file, &["down"]).await?;
        Ok(())
    }
}

/// One container row from `docker compose ps --format json`.
#[derive(Debug, Deserialize)]
struct PsRow {
    #[serde(rename = "State")]
    state: String,
}

/// Parse `ps` output. Current releases emit one JSON object per line; older
/// ones emit a single JSON array.
fn parse_ps_output(stdout: &str) -> HerdResult<ObservedState> {
    let trimmed = stdout.trim();

    let rows: Vec<PsRow> = if trimmed.is_empty() {
        Vec::new()
    } else if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        trimmed
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?
    };

    let running = rows.iter().filter(|row| row.state == "running").count();
    Ok(ObservedState {
        running,
        total: rows.len(),
    })
}

/// Resolved project configuration from `docker compose config --format json`.
#[derive(Debug, Deserialize)]
struct ResolvedConfig {
    name: Option<String>,
    #[serde(default)]
    services: std::collections::BTreeMap<String, ResolvedService>,
}

#[derive(Debug, Deserialize)]
struct ResolvedService {
    container_name: Option<String>,
}

/// Parse `config` output into the container names the stack would create:
/// an explicit `container_name`, or the default `<project>-<service>-1`.
fn parse_config_output(stdout: &str, fallback_project: &str) -> HerdResult<Vec<String>> {
    let config: ResolvedConfig = serde_json::from_str(stdout.trim())?;
    let project = config.name.as_deref().unwrap_or(fallback_project);

    Ok(config
        .services
        .iter()
        .map(|(service, resolved)| {
            resolved
                .container_name
                .clone()
                .unwrap_or_else(|| format!("{project}-{service}-1"))
        })
        .collect())
}

/// Name of the directory containing a compose file; the default compose
/// project name.
fn directory_name(compose_file: &Path) -> String {
    compose_file
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
