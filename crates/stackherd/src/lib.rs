//! # stackherd
//!
//! Desired-state reconciliation for Docker Compose stacks.
//!
//! A stack is declared enabled or disabled in `stack-config.yml`; each
//! reconciliation cycle compares that desired state against the containers
//! the runtime actually reports, issues corrective `docker compose` actions,
//! verifies that running stacks answer through the reverse proxy, and
//! reports the result.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod probe;
pub mod report;
pub mod shutdown;

#[cfg(test)]
pub(crate) mod testutil;
