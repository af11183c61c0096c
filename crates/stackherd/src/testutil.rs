//! Shared test doubles.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stackherd_common::{HerdError, HerdResult};
use stackherd_compose::{ObservedState, StackRuntime};

use crate::config::StackDefinition;
use crate::probe::{HealthProbe, ServiceHealth};

/// Build a stack definition with the usual defaults.
pub fn stack(id: &str, enabled: bool, priority: i64) -> StackDefinition {
    StackDefinition {
        id: id.to_string(),
        enabled,
        priority,
        description: String::new(),
        restart_on_ping_fail: true,
    }
}

/// Build a health record.
pub fn health(host: &str, reachable: bool, status_code: Option<u16>) -> ServiceHealth {
    ServiceHealth {
        host: host.to_string(),
        reachable,
        status_code,
    }
}

/// Scriptable in-memory runtime. Observed states are consumed per query,
/// with the last state repeating once the script runs out.
#[derive(Debug, Default, Clone)]
pub struct FakeRuntime {
    inner: Arc<RuntimeInner>,
}

#[derive(Debug, Default)]
struct RuntimeInner {
    calls: Mutex<Vec<String>>,
    states: Mutex<HashMap<PathBuf, VecDeque<ObservedState>>>,
    failing: Mutex<HashSet<PathBuf>>,
    expected: Mutex<HashMap<PathBuf, Vec<String>>>,
}

impl FakeRuntime {
    pub fn set_state(&self, compose_file: &Path, state: ObservedState) {
        self.set_states(compose_file, vec![state]);
    }

    pub fn set_states(&self, compose_file: &Path, states: Vec<ObservedState>) {
        self.inner
            .states
            .lock()
            .unwrap()
            .insert(compose_file.to_path_buf(), states.into());
    }

    pub fn fail_observe(&self, compose_file: &Path) {
        self.inner
            .failing
            .lock()
            .unwrap()
            .insert(compose_file.to_path_buf());
    }

    pub fn set_expected(&self, compose_file: &Path, containers: Vec<String>) {
        self.inner
            .expected
            .lock()
            .unwrap()
            .insert(compose_file.to_path_buf(), containers);
    }

    /// Number of recorded calls whose operation matches `op`.
    pub fn count(&self, op: &str) -> usize {
        self.inner
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(op))
            .count()
    }

    fn record(&self, op: &str, compose_file: &Path) {
        self.inner
            .calls
            .lock()
            .unwrap()
            .push(format!("{op} {}", compose_file.display()));
    }
}

#[async_trait]
impl StackRuntime for FakeRuntime {
    async fn expected_containers(&self, compose_file: &Path) -> HerdResult<Vec<String>> {
        self.record("expected", compose_file);
        Ok(self
            .inner
            .expected
            .lock()
            .unwrap()
            .get(compose_file)
            .cloned()
            .unwrap_or_default())
    }

    async fn observed_state(&self, compose_file: &Path) -> HerdResult<ObservedState> {
        self.record("observe", compose_file);

        if self.inner.failing.lock().unwrap().contains(compose_file) {
            return Err(HerdError::Runtime {
                message: "scripted failure".to_string(),
            });
        }

        let mut states = self.inner.states.lock().unwrap();
        let Some(queue) = states.get_mut(compose_file) else {
            return Ok(ObservedState {
                running: 0,
                total: 0,
            });
        };
        let Some(state) = queue.pop_front() else {
            return Ok(ObservedState {
                running: 0,
                total: 0,
            });
        };
        if queue.is_empty() {
            queue.push_back(state);
        }
        Ok(state)
    }

    async fn up(&self, compose_file: &Path) -> HerdResult<()> {
        self.record("up", compose_file);
        Ok(())
    }

    async fn down(&self, compose_file: &Path) -> HerdResult<()> {
        self.record("down", compose_file);
        Ok(())
    }
}

/// Scriptable probe. Unscripted stacks have no hosts; unscripted hosts are
/// reachable with a 200.
#[derive(Debug, Default, Clone)]
pub struct FakeProbe {
    inner: Arc<ProbeInner>,
}

#[derive(Debug, Default)]
struct ProbeInner {
    stacks: Mutex<HashMap<PathBuf, Vec<ServiceHealth>>>,
    failing: Mutex<HashSet<PathBuf>>,
    hosts: Mutex<HashMap<String, ServiceHealth>>,
}

impl FakeProbe {
    pub fn set_health(&self, compose_file: &Path, healths: Vec<ServiceHealth>) {
        self.inner
            .stacks
            .lock()
            .unwrap()
            .insert(compose_file.to_path_buf(), healths);
    }

    pub fn fail_stack(&self, compose_file: &Path) {
        self.inner
            .failing
            .lock()
            .unwrap()
            .insert(compose_file.to_path_buf());
    }

    pub fn set_host(&self, host: &str, record: ServiceHealth) {
        self.inner
            .hosts
            .lock()
            .unwrap()
            .insert(host.to_string(), record);
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn probe_stack(&self, compose_file: &Path) -> HerdResult<Vec<ServiceHealth>> {
        if self.inner.failing.lock().unwrap().contains(compose_file) {
            return Err(HerdError::Probe {
                message: "scripted failure".to_string(),
            });
        }
        Ok(self
            .inner
            .stacks
            .lock()
            .unwrap()
            .get(compose_file)
            .cloned()
            .unwrap_or_default())
    }

    async fn probe_host(&self, host: &str) -> ServiceHealth {
        self.inner
            .hosts
            .lock()
            .unwrap()
            .get(host)
            .cloned()
            .unwrap_or_else(|| health(host, true, Some(200)))
    }
}
