//! # stackherd-common
//!
//! Shared utilities and types for the stackherd workspace.
//!
//! This crate provides common functionality used across all stackherd crates:
//! - Common error types
//! - Standard filesystem paths

#![warn(missing_docs)]

pub mod error;
pub mod paths;

pub use error::{HerdError, HerdResult};
pub use paths::HerdPaths;
