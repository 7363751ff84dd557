//! Trellis - project scaffolding from versioned command packages
//!
//! Each command is implemented by a separately published package. Trellis
//! resolves the package in a registry, keeps it in a local module cache and
//! runs its entry file in a child process, forwarding a JSON argument bundle
//! and propagating the exit code.

pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod lifecycle;
pub mod package;
pub mod registry;
pub mod ui;

#[cfg(test)]
mod testing;

pub use error::{TrellisError, TrellisResult};
