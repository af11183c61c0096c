//! Typed configuration schema.
//!
//! Every recognized option and its default is enumerated here; anything
//! unrecognized fails loading with a [`HerdError::Config`]. The loaded
//! configuration is immutable for the lifetime of a run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use stackherd_common::{HerdError, HerdPaths, HerdResult};

/// Top-level configuration file (`stack-config.yml`).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Stack declarations, keyed by compose-file path relative to the root.
    #[serde(default)]
    pub stacks: BTreeMap<String, StackConfig>,

    /// Global settings.
    #[serde(default)]
    pub settings: Settings,
}

/// Desired state and metadata for one stack.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackConfig {
    /// Whether the stack should be running.
    #[serde(default)]
    pub enabled: bool,

    /// Reconciliation order, ascending. Infrastructure stacks get low
    /// priorities so they come up before their dependents.
    #[serde(default = "default_priority")]
    pub priority: i64,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Restart the stack when a declared host stops answering through the
    /// reverse proxy.
    #[serde(default = "default_true")]
    pub restart_on_ping_fail: bool,
}

/// Global settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Seconds between monitor cycles.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Seconds between the stop and start halves of a restart.
    #[serde(default = "default_restart_delay")]
    pub restart_delay: u64,

    /// Log file path. When set, log output is duplicated there.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Root directory stack ids are resolved against. Defaults to the
    /// directory containing the configuration file.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Reverse-proxy dynamic configuration directory, relative to the root,
    /// scanned for externally declared routes. Unset disables the listing.
    #[serde(default)]
    pub proxy_dynamic_dir: Option<PathBuf>,

    /// Shared-service suppression rules for stacks that embed a service
    /// also declared as its own stack.
    #[serde(default)]
    pub shared_services: Vec<SharedServiceRule>,
}

/// Suppression rule: a stop of a stack matching `service` is skipped while
/// the `provided_by` composite stack is enabled and running.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedServiceRule {
    /// Service name pattern, matched case-insensitively against stack ids
    /// and resolved container names.
    pub service: String,

    /// Stack id of the composite that also carries the service.
    pub provided_by: String,
}

/// A stack definition handed to the engine: the config entry plus its id.
#[derive(Debug, Clone)]
pub struct StackDefinition {
    /// Compose-file path relative to the root; the stack's identity.
    pub id: String,
    /// Whether the stack should be running.
    pub enabled: bool,
    /// Reconciliation order, ascending.
    pub priority: i64,
    /// Human-readable description.
    pub description: String,
    /// Restart on failed reachability probes.
    pub restart_on_ping_fail: bool,
}

impl StackDefinition {
    /// Short display name: the directory containing the compose file.
    #[must_use]
    pub fn short_name(&self) -> &str {
        let mut parts = self.id.rsplit('/');
        let last = parts.next().unwrap_or(self.id.as_str());
        parts.next().unwrap_or(last)
    }
}

const fn default_priority() -> i64 {
    999
}

const fn default_true() -> bool {
    true
}

const fn default_check_interval() -> u64 {
    300
}

const fn default_restart_delay() -> u64 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            restart_delay: default_restart_delay(),
            log_file: None,
            root: None,
            proxy_dynamic_dir: None,
            shared_services: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// Load and validate the configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`HerdError::Config`] when the file cannot be read, parsed,
    /// or fails validation. Configuration errors are fatal.
    pub fn load(path: &Path) -> HerdResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| HerdError::Config {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| HerdError::Config {
            message: format!("failed to parse {}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from YAML text and validate.
    ///
    /// # Errors
    ///
    /// Returns [`HerdError::Config`] on parse or validation failure.
    pub fn from_yaml(yaml: &str) -> HerdResult<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| HerdError::Config {
            message: format!("failed to parse configuration: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> HerdResult<()> {
        if self.settings.check_interval == 0 {
            return Err(HerdError::Config {
                message: "settings.check_interval must be at least 1 second".to_string(),
            });
        }
        for rule in &self.settings.shared_services {
            if !self.stacks.contains_key(&rule.provided_by) {
                return Err(HerdError::Config {
                    message: format!(
                        "shared service rule for `{}` references unknown stack `{}`",
                        rule.service, rule.provided_by
                    ),
                });
            }
        }
        Ok(())
    }

    /// Stack definitions in reconciliation order: ascending priority, ties
    /// broken by id for determinism.
    #[must_use]
    pub fn ordered_stacks(&self) -> Vec<StackDefinition> {
        let mut stacks: Vec<StackDefinition> = self
            .stacks
            .iter()
            .map(|(id, stack)| StackDefinition {
                id: id.clone(),
                enabled: stack.enabled,
                priority: stack.priority,
                description: stack.description.clone(),
                restart_on_ping_fail: stack.restart_on_ping_fail,
            })
            .collect();
        stacks.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        stacks
    }

    /// Filesystem paths for this configuration. The root falls back to the
    /// directory containing the configuration file.
    #[must_use]
    pub fn paths(&self, config_path: &Path) -> HerdPaths {
        let fallback = config_path.parent().unwrap_or_else(|| Path::new("."));
        HerdPaths::resolve(self.settings.root.clone(), fallback)
    }

    /// Seconds between monitor cycles, as a [`Duration`].
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.settings.check_interval)
    }

    /// Restart stop-to-start gap, as a [`Duration`].
    #[must_use]
    pub const fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.settings.restart_delay)
    }
}
