//! Standalone dynamic configuration files.
//!
//! Routes for services that live outside any stack are declared in the
//! reverse proxy's dynamic configuration directory. They are surfaced for
//! visibility only; no lifecycle action is ever taken on them, so malformed
//! files are logged and skipped rather than failing the caller.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::rule::parse_host_rule;

/// Router reserved for the proxy's own dashboard; never listed.
const INTERNAL_SERVICE: &str = "api@internal";

/// A route declared by a dynamic configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRoute {
    /// Routed hostname.
    pub host: String,
    /// Backend URL, when the router references a declared service.
    pub service_url: Option<String>,
    /// Name of the file declaring the route.
    pub file: String,
    /// Router name inside that file.
    pub router: String,
}

#[derive(Debug, Deserialize)]
struct DynamicConfig {
    http: Option<HttpSection>,
}

#[derive(Debug, Deserialize)]
struct HttpSection {
    #[serde(default)]
    routers: BTreeMap<String, RouterConfig>,
    #[serde(default)]
    services: BTreeMap<String, ServiceConfig>,
}

#[derive(Debug, Deserialize)]
struct RouterConfig {
    rule: Option<String>,
    service: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceConfig {
    #[serde(rename = "loadBalancer")]
    load_balancer: Option<LoadBalancer>,
}

#[derive(Debug, Deserialize)]
struct LoadBalancer {
    #[serde(default)]
    servers: Vec<Server>,
}

#[derive(Debug, Deserialize)]
struct Server {
    url: Option<String>,
}

/// Discover every route declared under a dynamic configuration directory.
///
/// Reads all `*.yml`/`*.yaml` files. A missing directory yields an empty
/// set; unreadable or malformed files and rules are logged and skipped.
#[must_use]
pub fn discover_external_routes(dir: &Path) -> Vec<ExternalRoute> {
    let mut routes = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "No dynamic configuration directory");
            return routes;
        }
    };

    let mut files: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("yml" | "yaml")
            )
        })
        .collect();
    files.sort();

    for path in files {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "Could not read dynamic configuration file");
                continue;
            }
        };

        let config: DynamicConfig = match serde_yaml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "Could not parse dynamic configuration file");
                continue;
            }
        };

        let Some(http) = config.http else { continue };

        for (router_name, router) in &http.routers {
            if router.service.as_deref() == Some(INTERNAL_SERVICE) {
                continue;
            }

            let Some(rule) = router.rule.as_deref() else {
                continue;
            };

            let endpoints = match parse_host_rule(rule) {
                Ok(endpoints) => endpoints,
                Err(e) => {
                    tracing::warn!(file = %file_name, router = %router_name, error = %e, "Skipping malformed router rule");
                    continue;
                }
            };

            let service_url = router
                .service
                .as_ref()
                .and_then(|name| http.services.get(name))
                .and_then(|service| service.load_balancer.as_ref())
                .and_then(|lb| lb.servers.first())
                .and_then(|server| server.url.clone());

            for endpoint in endpoints {
                routes.push(ExternalRoute {
                    host: endpoint.host,
                    service_url: service_url.clone(),
                    file: file_name.clone(),
                    router: router_name.clone(),
                });
            }
        }
    }

    routes
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAS_ROUTES: &str = r#"
http:
  routers:
    nas:
      rule: "Host(`nas.example.sh`)"
      service: nas
      entryPoints:
        - websecure
    dashboard:
      rule: "Host(`proxy.example.sh`)"
      service: api@internal
  services:
    nas:
      loadBalancer:
        servers:
          - url: "http://192.168.1.50:5000"
"#;

    fn write_dynamic(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn discovers_routes_and_backend_urls() {
        let dir = tempfile::tempdir().unwrap();
        write_dynamic(dir.path(), "nas.yml", NAS_ROUTES);

        let routes = discover_external_routes(dir.path());
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].host, "nas.example.sh");
        assert_eq!(
            routes[0].service_url.as_deref(),
            Some("http://192.168.1.50:5000")
        );
        assert_eq!(routes[0].file, "nas.yml");
        assert_eq!(routes[0].router, "nas");
    }

    #[test]
    fn internal_dashboard_router_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_dynamic(dir.path(), "nas.yml", NAS_ROUTES);

        let routes = discover_external_routes(dir.path());
        assert!(routes.iter().all(|route| route.router != "dashboard"));
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let routes = discover_external_routes(&dir.path().join("absent"));
        assert!(routes.is_empty());
    }

    #[test]
    fn malformed_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_dynamic(dir.path(), "bad.yml", ": not yaml :\n\t-");
        write_dynamic(dir.path(), "nas.yml", NAS_ROUTES);

        let routes = discover_external_routes(dir.path());
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn non_http_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_dynamic(dir.path(), "tcp.yml", "tcp:\n  routers: {}\n");

        assert!(discover_external_routes(dir.path()).is_empty());
    }

    #[test]
    fn dynamic_shape_matches_label_shape() {
        // The same rule text yields the same endpoints whether it arrives
        // from a label or from a dynamic file.
        let dir = tempfile::tempdir().unwrap();
        write_dynamic(
            dir.path(),
            "multi.yml",
            "http:\n  routers:\n    multi:\n      rule: \"Host(`a.example.sh`) || Host(`b.example.sh`)\"\n",
        );

        let from_file: Vec<String> = discover_external_routes(dir.path())
            .into_iter()
            .map(|route| route.host)
            .collect();
        let from_rule: Vec<String> =
            parse_host_rule("Host(`a.example.sh`) || Host(`b.example.sh`)")
                .unwrap()
                .into_iter()
                .map(|endpoint| endpoint.host)
                .collect();
        assert_eq!(from_file, from_rule);
    }
}
