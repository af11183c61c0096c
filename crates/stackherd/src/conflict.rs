//! Shared-service conflict resolution.
//!
//! A resource-heavy service is sometimes declared both as its own stack and
//! embedded inside a composite stack. Stopping the standalone stack while
//! the composite still serves the shared service would take the service
//! down for the composite too, so such stops are suppressed.

use stackherd_common::HerdPaths;
use stackherd_compose::StackRuntime;

use crate::config::{SharedServiceRule, StackDefinition};

/// Gate for destructive actions on stacks carrying shared services.
///
/// Matching is by stack identity against configured rules, not a general
/// dependency graph.
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    rules: Vec<SharedServiceRule>,
}

impl ConflictResolver {
    /// Create a resolver from the configured rules.
    #[must_use]
    pub fn new(rules: Vec<SharedServiceRule>) -> Self {
        Self { rules }
    }

    /// Decide whether stopping `stack` must be suppressed. Returns the
    /// suppression reason, or `None` when the stop may proceed.
    ///
    /// A stop is suppressed when a rule's service pattern matches the stack
    /// id and the rule's composite stack is enabled, observed running, and
    /// actually resolves a container for the shared service. When the
    /// composite's state cannot be observed it counts as unknown, and
    /// unknown is never treated as stopped when gating a destructive
    /// action: the stop is suppressed conservatively.
    pub async fn should_suppress_stop<R: StackRuntime>(
        &self,
        stack: &StackDefinition,
        all_stacks: &[StackDefinition],
        runtime: &R,
        paths: &HerdPaths,
    ) -> Option<String> {
        let stack_id = stack.id.to_lowercase();

        for rule in &self.rules {
            let service = rule.service.to_lowercase();
            if !stack_id.contains(&service) {
                continue;
            }

            let Some(composite) = all_stacks.iter().find(|other| other.id == rule.provided_by)
            else {
                continue;
            };
            if !composite.enabled || composite.id == stack.id {
                continue;
            }

            let compose_file = paths.compose_file(&composite.id);

            let running = match runtime.observed_state(&compose_file).await {
                Ok(observed) => observed.is_running(),
                Err(e) => {
                    tracing::warn!(
                        stack = %stack.id,
                        composite = %composite.id,
                        error = %e,
                        "Composite state unknown, suppressing stop"
                    );
                    return Some(format!(
                        "state of composite stack `{}` is unknown, keeping shared service `{}`",
                        composite.id, rule.service
                    ));
                }
            };
            if !running {
                continue;
            }

            let carries_service = match runtime.expected_containers(&compose_file).await {
                Ok(containers) => containers
                    .iter()
                    .any(|name| name.to_lowercase().contains(&service)),
                Err(e) => {
                    tracing::warn!(
                        stack = %stack.id,
                        composite = %composite.id,
                        error = %e,
                        "Could not resolve composite containers, suppressing stop"
                    );
                    true
                }
            };

            if carries_service {
                return Some(format!(
                    "shared service `{}` is provided by running stack `{}`",
                    rule.service, composite.id
                ));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackherd_common::HerdPaths;
    use stackherd_compose::ObservedState;

    use crate::testutil::{FakeRuntime, stack};

    const QDRANT: &str = "stacks/qdrant/compose.yml";
    const PERSISTENCE: &str = "stacks/persistence/compose.yml";

    fn rules() -> Vec<SharedServiceRule> {
        vec![SharedServiceRule {
            service: "qdrant".to_string(),
            provided_by: PERSISTENCE.to_string(),
        }]
    }

    fn paths() -> HerdPaths {
        HerdPaths::with_root("/srv/stacks")
    }

    fn defs() -> Vec<StackDefinition> {
        vec![stack(QDRANT, false, 10), stack(PERSISTENCE, true, 5)]
    }

    #[tokio::test]
    async fn suppresses_when_composite_runs_the_service() {
        let runtime = FakeRuntime::default();
        runtime.set_state(
            &paths().compose_file(PERSISTENCE),
            ObservedState {
                running: 3,
                total: 3,
            },
        );
        runtime.set_expected(
            &paths().compose_file(PERSISTENCE),
            vec!["persistence-postgres-1".into(), "persistence-qdrant-1".into()],
        );

        let resolver = ConflictResolver::new(rules());
        let all = defs();
        let reason = resolver
            .should_suppress_stop(&all[0], &all, &runtime, &paths())
            .await;
        assert!(reason.is_some());
        assert!(reason.unwrap().contains(PERSISTENCE));
    }

    #[tokio::test]
    async fn no_suppression_when_composite_is_stopped() {
        let runtime = FakeRuntime::default();
        runtime.set_state(
            &paths().compose_file(PERSISTENCE),
            ObservedState {
                running: 0,
                total: 3,
            },
        );

        let resolver = ConflictResolver::new(rules());
        let all = defs();
        let reason = resolver
            .should_suppress_stop(&all[0], &all, &runtime, &paths())
            .await;
        assert!(reason.is_none());
    }

    #[tokio::test]
    async fn no_suppression_when_composite_is_disabled() {
        let runtime = FakeRuntime::default();
        runtime.set_state(
            &paths().compose_file(PERSISTENCE),
            ObservedState {
                running: 3,
                total: 3,
            },
        );

        let resolver = ConflictResolver::new(rules());
        let all = vec![stack(QDRANT, false, 10), stack(PERSISTENCE, false, 5)];
        let reason = resolver
            .should_suppress_stop(&all[0], &all, &runtime, &paths())
            .await;
        assert!(reason.is_none());
    }

    #[tokio::test]
    async fn no_suppression_when_composite_lacks_the_service() {
        let runtime = FakeRuntime::default();
        runtime.set_state(
            &paths().compose_file(PERSISTENCE),
            ObservedState {
                running: 2,
                total: 2,
            },
        );
        runtime.set_expected(
            &paths().compose_file(PERSISTENCE),
            vec!["persistence-postgres-1".into(), "persistence-redis-1".into()],
        );

        let resolver = ConflictResolver::new(rules());
        let all = defs();
        let reason = resolver
            .should_suppress_stop(&all[0], &all, &runtime, &paths())
            .await;
        assert!(reason.is_none());
    }

    #[tokio::test]
    async fn unknown_composite_state_suppresses_conservatively() {
        let runtime = FakeRuntime::default();
        runtime.fail_observe(&paths().compose_file(PERSISTENCE));

        let resolver = ConflictResolver::new(rules());
        let all = defs();
        let reason = resolver
            .should_suppress_stop(&all[0], &all, &runtime, &paths())
            .await;
        assert!(reason.is_some());
        assert!(reason.unwrap().contains("unknown"));
    }

    #[tokio::test]
    async fn unrelated_stack_is_never_suppressed() {
        let runtime = FakeRuntime::default();
        let resolver = ConflictResolver::new(rules());
        let all = vec![stack("stacks/media/compose.yml", false, 1), stack(PERSISTENCE, true, 5)];
        let reason = resolver
            .should_suppress_stop(&all[0], &all, &runtime, &paths())
            .await;
        assert!(reason.is_none());
    }
}
