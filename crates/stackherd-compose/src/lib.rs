//! # stackherd-compose
//!
//! Interface to the `docker compose` CLI for the stackherd workspace.
//!
//! This crate provides:
//! - [`StackRuntime`], the async trait the reconciliation engine talks to
//! - [`ComposeClient`], the `docker compose` implementation of that trait
//! - [`ComposeFile`], the compose-file model used for route discovery

#![warn(missing_docs)]

pub mod client;
pub mod file;
pub mod runtime;

pub use client::ComposeClient;
pub use file::{ComposeFile, ComposeFileError, Labels};
pub use runtime::{ObservedState, StackRuntime};
