//! # stackherd-proxy
//!
//! Reverse-proxy (Traefik) routing declarations.
//!
//! This crate provides:
//! - [`parse_host_rule`], the router rule grammar parser
//! - [`discover_external_routes`], discovery over standalone dynamic
//!   configuration files

#![warn(missing_docs)]

pub mod dynamic;
pub mod rule;

pub use dynamic::{ExternalRoute, discover_external_routes};
pub use rule::{RouteEndpoint, RuleParseError, parse_host_rule};
