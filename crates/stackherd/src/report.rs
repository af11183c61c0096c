//! Read-only status snapshot.
//!
//! The reporter performs the same observation and probe calls as the engine
//! but never issues a mutating action.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use console::style;
use stackherd_common::HerdPaths;
use stackherd_compose::StackRuntime;
use stackherd_proxy::{ExternalRoute, discover_external_routes};
use tabled::{Table, Tabled};

use crate::config::StackDefinition;
use crate::probe::{HealthProbe, ServiceHealth, discover_endpoints};

/// One stack in the snapshot.
#[derive(Debug, Clone)]
pub struct StackStatus {
    /// Stack id.
    pub id: String,
    /// Short display name.
    pub name: String,
    /// Configured description.
    pub description: String,
    /// Observed state summary, or the reason it is unknown.
    pub status: String,
    /// Per-host reachability for running enabled stacks.
    pub hosts: Vec<ServiceHealth>,
}

/// An externally declared route and its reachability.
#[derive(Debug, Clone)]
pub struct ExternalStatus {
    /// The route declaration.
    pub route: ExternalRoute,
    /// Probe result for the route's hostname.
    pub health: ServiceHealth,
}

/// Snapshot of every stack and externally declared route.
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// When the snapshot was taken.
    pub generated_at: DateTime<Local>,
    /// Number of enabled stacks.
    pub enabled: usize,
    /// Number of stacks observed fully running.
    pub running: usize,
    /// Enabled and running.
    pub active: Vec<StackStatus>,
    /// Enabled but not running.
    pub issues: Vec<StackStatus>,
    /// Disabled.
    pub inactive: Vec<StackStatus>,
    /// Routes visible through the proxy but owned by no stack. Listed for
    /// visibility only; no lifecycle action is ever taken on them.
    pub external: Vec<ExternalStatus>,
}

impl StatusReport {
    /// Probed hosts that answered, across active stacks.
    #[must_use]
    pub fn healthy_services(&self) -> usize {
        self.active
            .iter()
            .flat_map(|stack| &stack.hosts)
            .filter(|host| host.reachable)
            .count()
    }

    /// Probed hosts across active stacks.
    #[must_use]
    pub fn total_services(&self) -> usize {
        self.active.iter().map(|stack| stack.hosts.len()).sum()
    }

    /// Render the snapshot for a terminal.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "{}  {}\n",
            style("Stack Status").bold(),
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!(
            "Stacks: {}/{} running │ Services: {}/{} healthy\n",
            self.running,
            self.enabled,
            self.healthy_services(),
            self.total_services()
        ));

        if !self.active.is_empty() {
            out.push_str(&format!("\n{}\n", style("Active").green().bold()));
            let rows: Vec<ActiveRow> = self.active.iter().map(ActiveRow::from).collect();
            out.push_str(&Table::new(rows).to_string());
            out.push('\n');
        }

        if !self.issues.is_empty() {
            out.push_str(&format!("\n{}\n", style("Issues").red().bold()));
            let rows: Vec<IssueRow> = self.issues.iter().map(IssueRow::from).collect();
            out.push_str(&Table::new(rows).to_string());
            out.push('\n');
        }

        if !self.inactive.is_empty() {
            let names: Vec<&str> = self.inactive.iter().map(|stack| stack.name.as_str()).collect();
            out.push_str(&format!(
                "\n{}\n  {}\n",
                style("Inactive").dim().bold(),
                names.join(", ")
            ));
        }

        if !self.external.is_empty() {
            out.push_str(&format!("\n{}\n", style("External routes").cyan().bold()));
            let rows: Vec<ExternalRow> = self.external.iter().map(ExternalRow::from).collect();
            out.push_str(&Table::new(rows).to_string());
            out.push('\n');
        }

        out
    }
}

#[derive(Tabled)]
struct ActiveRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "DESCRIPTION")]
    description: String,
    #[tabled(rename = "ROUTES")]
    routes: String,
}

impl From<&StackStatus> for ActiveRow {
    fn from(stack: &StackStatus) -> Self {
        let routes = if stack.hosts.is_empty() {
            "-".to_string()
        } else {
            stack
                .hosts
                .iter()
                .map(mark_host)
                .collect::<Vec<_>>()
                .join(", ")
        };
        Self {
            name: stack.name.clone(),
            description: stack.description.clone(),
            routes,
        }
    }
}

#[derive(Tabled)]
struct IssueRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

impl From<&StackStatus> for IssueRow {
    fn from(stack: &StackStatus) -> Self {
        Self {
            name: stack.name.clone(),
            status: stack.status.clone(),
        }
    }
}

#[derive(Tabled)]
struct ExternalRow {
    #[tabled(rename = "HOST")]
    host: String,
    #[tabled(rename = "BACKEND")]
    backend: String,
    #[tabled(rename = "FILE")]
    file: String,
}

impl From<&ExternalStatus> for ExternalRow {
    fn from(external: &ExternalStatus) -> Self {
        Self {
            host: mark_host(&external.health),
            backend: external
                .route
                .service_url
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            file: external.route.file.clone(),
        }
    }
}

fn mark_host(health: &ServiceHealth) -> String {
    if health.reachable {
        format!("✓ {}", health.host)
    } else {
        format!("✗ {}", health.host)
    }
}

/// Builds [`StatusReport`]s.
pub struct StatusReporter<'a, R, P> {
    runtime: &'a R,
    probe: &'a P,
    paths: &'a HerdPaths,
    dynamic_dir: Option<PathBuf>,
}

impl<'a, R: StackRuntime, P: HealthProbe> StatusReporter<'a, R, P> {
    /// Create a reporter. `dynamic_dir` is the proxy's dynamic
    /// configuration directory, relative to the root; `None` disables the
    /// external-route listing.
    pub fn new(
        runtime: &'a R,
        probe: &'a P,
        paths: &'a HerdPaths,
        dynamic_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            runtime,
            probe,
            paths,
            dynamic_dir,
        }
    }

    /// Take a snapshot of every stack. Observation failures degrade to
    /// "status unknown" entries; nothing here mutates runtime state.
    pub async fn snapshot(&self, stacks: &[StackDefinition]) -> StatusReport {
        let mut ordered: Vec<&StackDefinition> = stacks.iter().collect();
        ordered.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

        let mut report = StatusReport {
            generated_at: Local::now(),
            enabled: ordered.iter().filter(|stack| stack.enabled).count(),
            running: 0,
            active: Vec::new(),
            issues: Vec::new(),
            inactive: Vec::new(),
            external: Vec::new(),
        };

        let mut owned_hosts: HashSet<String> = HashSet::new();

        for stack in ordered {
            let compose_file = self.paths.compose_file(&stack.id);

            let (running, status) = match self.runtime.observed_state(&compose_file).await {
                Ok(observed) => (observed.is_running(), observed.summary()),
                Err(e) => {
                    tracing::warn!(stack = %stack.id, error = %e, "Status unknown");
                    (false, format!("status unknown: {e}"))
                }
            };
            if running {
                report.running += 1;
            }

            let endpoints = match discover_endpoints(&compose_file) {
                Ok(endpoints) => endpoints,
                Err(e) => {
                    tracing::warn!(stack = %stack.id, error = %e, "Could not discover routes");
                    Vec::new()
                }
            };
            for endpoint in &endpoints {
                owned_hosts.insert(endpoint.host.clone());
            }

            let mut hosts = Vec::new();
            if stack.enabled && running {
                for endpoint in &endpoints {
                    hosts.push(self.probe.probe_host(&endpoint.host).await);
                }
            }

            let status_entry = StackStatus {
                id: stack.id.clone(),
                name: stack.short_name().to_string(),
                description: stack.description.clone(),
                status,
                hosts,
            };

            if stack.enabled {
                if running {
                    report.active.push(status_entry);
                } else {
                    report.issues.push(status_entry);
                }
            } else {
                report.inactive.push(status_entry);
            }
        }

        if let Some(dir) = &self.dynamic_dir {
            let routes = discover_external_routes(&self.paths.under_root(dir));
            for route in routes {
                if owned_hosts.contains(&route.host) {
                    continue;
                }
                let health = self.probe.probe_host(&route.host).await;
                report.external.push(ExternalStatus { route, health });
            }
        }

        report
    }
}
