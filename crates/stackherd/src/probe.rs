//! Reachability probing through the reverse proxy.

use std::collections::HashSet;
use std::error::Error as _;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use stackherd_common::{HerdError, HerdResult};
use stackherd_compose::ComposeFile;
use stackherd_proxy::{RouteEndpoint, parse_host_rule};

/// Timeout per probe attempt. At most two attempts are made per host.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Reachability of one routed hostname at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHealth {
    /// The probed hostname.
    pub host: String,
    /// Whether any response was received. A 4xx/5xx response still counts:
    /// the service answered.
    pub reachable: bool,
    /// Status code of the response, when one was received.
    pub status_code: Option<u16>,
}

impl ServiceHealth {
    /// Aggregate verdict: healthy iff every declared host is reachable.
    /// A stack with no declared hosts has nothing to check and is healthy.
    #[must_use]
    pub fn all_reachable(healths: &[Self]) -> bool {
        healths.iter().all(|health| health.reachable)
    }
}

/// Reachability probing over a stack's declared route endpoints.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probe every hostname the stack declares. An empty result means the
    /// stack has no external route to check.
    async fn probe_stack(&self, compose_file: &Path) -> HerdResult<Vec<ServiceHealth>>;

    /// Probe a single hostname.
    async fn probe_host(&self, host: &str) -> ServiceHealth;
}

/// Resolve the route endpoints a stack declares through its compose labels.
///
/// Duplicate hostnames (several routers for one host) collapse to one
/// endpoint, preserving first-seen order.
///
/// # Errors
///
/// Returns an error when the compose file cannot be read or a router rule
/// is malformed.
pub fn discover_endpoints(compose_file: &Path) -> HerdResult<Vec<RouteEndpoint>> {
    let file = ComposeFile::from_file(compose_file).map_err(|e| HerdError::Probe {
        message: format!("{}: {e}", compose_file.display()),
    })?;

    let mut seen = HashSet::new();
    let mut endpoints = Vec::new();
    for rule in file.router_rules() {
        let parsed = parse_host_rule(&rule).map_err(|e| HerdError::Probe {
            message: format!("{}: {e}", compose_file.display()),
        })?;
        for endpoint in parsed {
            if seen.insert(endpoint.host.clone()) {
                endpoints.push(endpoint);
            }
        }
    }
    Ok(endpoints)
}

/// HTTP(S) reachability probe.
///
/// Tries HTTPS with certificate verification first; a TLS failure gets one
/// retry with verification disabled (self-signed certs behind the proxy are
/// common and the probe only asks "does anything answer"). Any other
/// transport failure marks the host unreachable.
pub struct HttpProbe {
    verified: reqwest::Client,
    insecure: reqwest::Client,
}

impl HttpProbe {
    /// Build the probe clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying TLS backend cannot be initialized.
    pub fn new() -> HerdResult<Self> {
        let verified = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| HerdError::Probe {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        let insecure = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| HerdError::Probe {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { verified, insecure })
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe_stack(&self, compose_file: &Path) -> HerdResult<Vec<ServiceHealth>> {
        let endpoints = discover_endpoints(compose_file)?;
        let mut healths = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            healths.push(self.probe_host(&endpoint.host).await);
        }
        Ok(healths)
    }

    async fn probe_host(&self, host: &str) -> ServiceHealth {
        let url = format!("https://{host}");

        match self.verified.get(&url).send().await {
            Ok(response) => ServiceHealth {
                host: host.to_string(),
                reachable: true,
                status_code: Some(response.status().as_u16()),
            },
            Err(e) if is_tls_failure(&e) => {
                tracing::debug!(host, error = %e, "TLS verification failed, retrying without");
                match self.insecure.get(&url).send().await {
                    Ok(response) => ServiceHealth {
                        host: host.to_string(),
                        reachable: true,
                        status_code: Some(response.status().as_u16()),
                    },
                    Err(e) => {
                        tracing::debug!(host, error = %e, "Host unreachable");
                        ServiceHealth {
                            host: host.to_string(),
                            reachable: false,
                            status_code: None,
                        }
                    }
                }
            }
            Err(e) => {
                tracing::debug!(host, error = %e, "Host unreachable");
                ServiceHealth {
                    host: host.to_string(),
                    reachable: false,
                    status_code: None,
                }
            }
        }
    }
}

/// Whether a request error originates in the TLS layer (as opposed to DNS,
/// connection refused, or a timeout). reqwest does not expose this
/// distinction directly, so the error source chain is inspected.
fn is_tls_failure(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        let message = cause.to_string().to_lowercase();
        if message.contains("certificate") || message.contains("tls") || message.contains("handshake")
        {
            return true;
        }
        source = cause.source();
    }
    false
}
