// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # cxbuild-observability
//!
//! Logging infrastructure shared by the cxbuild crates, with per-crate debug
//! flag support.
//!
//! Every crate logs through `tracing` with its own crate name as the target,
//! e.g. `info!(target: "cxbuild-development", ...)`, so that
//! `--debug-cxbuild-development` narrows debug output to one crate.
//!
//! ## Features
//! - `file-logging`: JSON log files in timestamped run folders

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known cxbuild crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "cxbuild",
    "cxbuild-config",
    "cxbuild-tables",
    "cxbuild-development",
];
