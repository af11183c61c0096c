//! Container runtime interface.

use std::path::Path;

use async_trait::async_trait;
use stackherd_common::HerdResult;

/// Observed container counts for a stack at a point in time.
///
/// Recomputed on every query and never cached across cycles: the engine must
/// tolerate the state changing between the query and the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservedState {
    /// Containers reported as running.
    pub running: usize,
    /// Containers defined for the stack.
    pub total: usize,
}

impl ObservedState {
    /// True when every defined container is running and at least one exists.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.total > 0 && self.running == self.total
    }

    /// Human-readable state summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.total == 0 {
            "no containers found".to_string()
        } else if self.is_running() {
            format!("all {} containers running", self.total)
        } else {
            format!("{}/{} containers running", self.running, self.total)
        }
    }
}

/// Stack lifecycle operations the reconciliation engine requires.
///
/// Calls may fail transiently (process or transport errors); callers must
/// treat failure as "status unknown", never as "stopped". `up`/`down` are
/// not guaranteed synchronous: re-poll [`StackRuntime::observed_state`] to
/// confirm the effect.
#[async_trait]
pub trait StackRuntime: Send + Sync {
    /// Resolve the container names this stack would create. Side-effect-free.
    async fn expected_containers(&self, compose_file: &Path) -> HerdResult<Vec<String>>;

    /// Query the current container counts for a stack. Side-effect-free.
    async fn observed_state(&self, compose_file: &Path) -> HerdResult<ObservedState>;

    /// Bring the stack up (detached).
    async fn up(&self, compose_file: &Path) -> HerdResult<()>;

    /// Bring the stack down.
    async fn down(&self, compose_file: &Path) -> HerdResult<()>;
}
