//! The reconciliation engine.
//!
//! One cycle walks every stack in priority order, compares the desired
//! state from configuration with the state the runtime reports, and issues
//! corrective actions. Decisions are computed fresh from the current-cycle
//! observation tuple; no prior decision is consulted, which makes the
//! engine level-triggered and restart-safe.

use std::fmt;
use std::time::Duration;

use stackherd_common::{HerdPaths, HerdResult};
use stackherd_compose::{ObservedState, StackRuntime};

use crate::config::StackDefinition;
use crate::conflict::ConflictResolver;
use crate::probe::{HealthProbe, ServiceHealth};
use crate::shutdown::Shutdown;

/// Decision reason used when a stack's observation failed.
const OBSERVATION_FAILED: &str = "error: observation failed";

/// Corrective action issued for a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The stack was brought up.
    Start,
    /// The stack was brought down.
    Stop,
    /// The stack was brought down and back up.
    Restart,
    /// Nothing was done.
    Noop,
}

impl Action {
    /// Whether the action mutated runtime state.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        !matches!(self, Self::Noop)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
            Self::Restart => write!(f, "restart"),
            Self::Noop => write!(f, "noop"),
        }
    }
}

/// Action plus the observation that led to it.
#[derive(Debug, Clone)]
pub struct Decision {
    /// The action taken.
    pub action: Action,
    /// Why it was taken.
    pub reason: String,
}

impl Decision {
    fn new(action: Action, reason: impl Into<String>) -> Self {
        Self {
            action,
            reason: reason.into(),
        }
    }

    fn noop(reason: impl Into<String>) -> Self {
        Self::new(Action::Noop, reason)
    }
}

/// Result of reconciling one stack.
#[derive(Debug, Clone)]
pub struct StackOutcome {
    /// Stack id.
    pub stack: String,
    /// Container counts at the start of processing, when observable.
    pub observed: Option<ObservedState>,
    /// The decision taken.
    pub decision: Decision,
    /// Per-host reachability, when the stack was probed.
    pub health: Vec<ServiceHealth>,
    /// A start was issued but the stack still was not running afterwards.
    pub escalated: bool,
}

impl StackOutcome {
    fn observation_failed(stack: &StackDefinition) -> Self {
        Self {
            stack: stack.id.clone(),
            observed: None,
            decision: Decision::noop(OBSERVATION_FAILED),
            health: Vec::new(),
            escalated: false,
        }
    }
}

/// Result of one reconciliation cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Per-stack outcomes, in visit order.
    pub outcomes: Vec<StackOutcome>,
    /// The cycle ended early because shutdown was requested.
    pub interrupted: bool,
}

impl CycleReport {
    /// Number of stacks a mutating action was issued for.
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.decision.action.is_mutating())
            .count()
    }
}

/// Engine timing knobs. Tests run with [`EngineOptions::immediate`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Wait after a start before re-querying to confirm recovery.
    pub settle_delay: Duration,
    /// Gap between the stop and start halves of a restart.
    pub restart_delay: Duration,
    /// Pause between successive stacks, bounding load on the runtime.
    pub pace_delay: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(10),
            restart_delay: Duration::from_secs(5),
            pace_delay: Duration::from_secs(2),
        }
    }
}

impl EngineOptions {
    /// Options with every delay at zero.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            restart_delay: Duration::ZERO,
            pace_delay: Duration::ZERO,
        }
    }
}

/// Drives desired state towards observed state, one cycle at a time.
///
/// All collaborators are injected at construction; the engine holds no
/// global state.
pub struct ReconcileEngine<R, P> {
    runtime: R,
    probe: P,
    resolver: ConflictResolver,
    paths: HerdPaths,
    options: EngineOptions,
    shutdown: Shutdown,
}

impl<R: StackRuntime, P: HealthProbe> ReconcileEngine<R, P> {
    /// Create an engine.
    pub fn new(
        runtime: R,
        probe: P,
        resolver: ConflictResolver,
        paths: HerdPaths,
        options: EngineOptions,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            runtime,
            probe,
            resolver,
            paths,
            options,
            shutdown,
        }
    }

    /// Run one reconciliation cycle over the given stacks.
    ///
    /// Stacks are visited in ascending priority order. Each stack is
    /// processed independently: an error is caught at the stack boundary,
    /// logged, and recorded as a no-op so the cycle always completes. At
    /// most one mutating action is issued per stack per cycle.
    pub async fn run_cycle(&self, stacks: &[StackDefinition]) -> CycleReport {
        let mut ordered: Vec<&StackDefinition> = stacks.iter().collect();
        ordered.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

        tracing::info!(stacks = ordered.len(), "Starting reconciliation cycle");

        let mut report = CycleReport::default();
        let last = ordered.len().saturating_sub(1);

        for (index, stack) in ordered.into_iter().enumerate() {
            if self.shutdown.requested() {
                tracing::info!("Shutdown requested, ending cycle early");
                report.interrupted = true;
                break;
            }

            let outcome = match self.reconcile_stack(stack, stacks).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(stack = %stack.id, error = %e, "Observation failed");
                    StackOutcome::observation_failed(stack)
                }
            };

            tracing::debug!(
                stack = %stack.id,
                action = %outcome.decision.action,
                reason = %outcome.decision.reason,
                "Stack reconciled"
            );
            report.outcomes.push(outcome);

            if index < last {
                tokio::time::sleep(self.options.pace_delay).await;
            }
        }

        tracing::info!(
            stacks = report.outcomes.len(),
            mutations = report.mutations(),
            "Reconciliation cycle completed"
        );
        report
    }

    async fn reconcile_stack(
        &self,
        stack: &StackDefinition,
        all_stacks: &[StackDefinition],
    ) -> HerdResult<StackOutcome> {
        let compose_file = self.paths.compose_file(&stack.id);
        let observed = self.runtime.observed_state(&compose_file).await?;

        match (stack.enabled, observed.is_running()) {
            (true, false) => self.start_stack(stack, observed).await,
            (false, true) => self.stop_stack(stack, all_stacks, observed).await,
            (true, true) => self.verify_stack(stack, observed).await,
            (false, false) => Ok(StackOutcome {
                stack: stack.id.clone(),
                observed: Some(observed),
                decision: Decision::noop("stopped as expected"),
                health: Vec::new(),
                escalated: false,
            }),
        }
    }

    /// Enabled but not running: bring the stack up, then confirm once after
    /// a settle delay. A stack that still is not running gets a non-fatal
    /// escalation; no further retry this cycle.
    async fn start_stack(
        &self,
        stack: &StackDefinition,
        observed: ObservedState,
    ) -> HerdResult<StackOutcome> {
        tracing::warn!(
            stack = %stack.id,
            observed = %observed.summary(),
            "Stack should be running but is not"
        );

        let compose_file = self.paths.compose_file(&stack.id);
        let mut escalated = false;

        match self.runtime.up(&compose_file).await {
            Ok(()) => {
                tokio::time::sleep(self.options.settle_delay).await;
                match self.runtime.observed_state(&compose_file).await {
                    Ok(after) if after.is_running() => {
                        tracing::info!(stack = %stack.id, "Stack recovered");
                    }
                    Ok(after) => {
                        escalated = true;
                        tracing::error!(
                            stack = %stack.id,
                            observed = %after.summary(),
                            "Stack failed to recover after start"
                        );
                    }
                    Err(e) => {
                        // Status unknown, not known-bad: log, don't escalate.
                        tracing::warn!(
                            stack = %stack.id,
                            error = %e,
                            "Could not confirm stack recovery"
                        );
                    }
                }
            }
            Err(e) => {
                escalated = true;
                tracing::error!(stack = %stack.id, error = %e, "Failed to start stack");
            }
        }

        Ok(StackOutcome {
            stack: stack.id.clone(),
            observed: Some(observed),
            decision: Decision::new(
                Action::Start,
                format!("stack not running ({}), start issued", observed.summary()),
            ),
            health: Vec::new(),
            escalated,
        })
    }

    /// Disabled but running: stop, unless a shared-service rule suppresses
    /// the stop.
    async fn stop_stack(
        &self,
        stack: &StackDefinition,
        all_stacks: &[StackDefinition],
        observed: ObservedState,
    ) -> HerdResult<StackOutcome> {
        if let Some(reason) = self
            .resolver
            .should_suppress_stop(stack, all_stacks, &self.runtime, &self.paths)
            .await
        {
            tracing::info!(stack = %stack.id, %reason, "Stop suppressed");
            return Ok(StackOutcome {
                stack: stack.id.clone(),
                observed: Some(observed),
                decision: Decision::noop(format!("stop suppressed: {reason}")),
                health: Vec::new(),
                escalated: false,
            });
        }

        tracing::info!(stack = %stack.id, "Stack is running but disabled, stopping");
        let compose_file = self.paths.compose_file(&stack.id);
        if let Err(e) = self.runtime.down(&compose_file).await {
            tracing::error!(stack = %stack.id, error = %e, "Failed to stop stack");
        }

        Ok(StackOutcome {
            stack: stack.id.clone(),
            observed: Some(observed),
            decision: Decision::new(Action::Stop, "stack disabled, stop issued"),
            health: Vec::new(),
            escalated: false,
        })
    }

    /// Enabled and running: verify reachability through the proxy and
    /// restart once when a host has gone dark.
    async fn verify_stack(
        &self,
        stack: &StackDefinition,
        observed: ObservedState,
    ) -> HerdResult<StackOutcome> {
        let compose_file = self.paths.compose_file(&stack.id);
        let health = self.probe.probe_stack(&compose_file).await?;

        let unreachable: Vec<&ServiceHealth> =
            health.iter().filter(|h| !h.reachable).collect();

        if unreachable.is_empty() {
            return Ok(StackOutcome {
                stack: stack.id.clone(),
                observed: Some(observed),
                decision: Decision::noop("running and healthy"),
                health,
                escalated: false,
            });
        }

        for failed in &unreachable {
            tracing::warn!(
                stack = %stack.id,
                host = %failed.host,
                "Host not reachable through the proxy"
            );
        }

        if !stack.restart_on_ping_fail {
            return Ok(StackOutcome {
                stack: stack.id.clone(),
                observed: Some(observed),
                decision: Decision::noop("unreachable hosts, restart_on_ping_fail disabled"),
                health,
                escalated: false,
            });
        }

        // One restart per cycle, no matter how many hosts failed.
        let hosts: Vec<&str> = unreachable.iter().map(|h| h.host.as_str()).collect();
        tracing::info!(
            stack = %stack.id,
            hosts = ?hosts,
            "Restarting stack after failed reachability check"
        );

        if let Err(e) = self.runtime.down(&compose_file).await {
            tracing::error!(stack = %stack.id, error = %e, "Failed to stop stack for restart");
        }
        tokio::time::sleep(self.options.restart_delay).await;
        if let Err(e) = self.runtime.up(&compose_file).await {
            tracing::error!(stack = %stack.id, error = %e, "Failed to start stack after restart");
        }

        Ok(StackOutcome {
            stack: stack.id.clone(),
            observed: Some(observed),
            decision: Decision::new(
                Action::Restart,
                format!("unreachable hosts ({}), restart issued", hosts.join(", ")),
            ),
            health,
            escalated: false,
        })
    }
}
