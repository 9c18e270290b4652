// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console output always; with the `file-logging` feature, JSON files in a
//! timestamped run folder:
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       ├── cxbuild-development.log
//!       ├── cxbuild-tables.log
//!       └── cxbuild.log (combined)
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps file writers alive; logs are flushed when this is dropped
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder holding this run's log files, if file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

fn env_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .with_context(|| format!("Invalid log filter '{}'", directives))
}

/// Install the global tracing subscriber
///
/// # Arguments
/// * `debug_flags` - Per-crate debug flags layered over `config.level`
/// * `config` - Level, console format and optional log directory
///
/// # Errors
/// Fails on an invalid level, an unwritable log directory, or when a global
/// subscriber is already installed.
pub fn init_logging(debug_flags: &CrateDebugFlags, config: &LoggingConfig) -> Result<LoggingGuard> {
    let directives = debug_flags.to_filter_string(&config.level);

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false);
    match config.format {
        LogFormat::Text => layers.push(console.with_filter(env_filter(&directives)?).boxed()),
        LogFormat::Json => {
            layers.push(console.json().with_filter(env_filter(&directives)?).boxed())
        }
    }

    #[cfg(feature = "file-logging")]
    let (file_guards, log_dir) = match &config.log_dir {
        Some(base_dir) => {
            let files = file::file_layers(base_dir, &directives, config.retention_runs)?;
            layers.extend(files.layers);
            (files.guards, Some(files.run_folder))
        }
        None => (Vec::new(), None),
    };

    Registry::default()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    #[cfg(not(feature = "file-logging"))]
    let log_dir = {
        if config.log_dir.is_some() {
            tracing::warn!(
                target: "cxbuild-observability",
                "Log directory ignored: built without the file-logging feature"
            );
        }
        None
    };

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        log_dir,
    })
}

/// Console-only logging at the given level
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(debug_flags, &LoggingConfig::default())
}

#[cfg(feature = "file-logging")]
mod file {
    use super::{env_filter, BoxedLayer};
    use anyhow::{Context, Result};
    use chrono::{NaiveDateTime, Utc};
    use std::path::{Path, PathBuf};
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_appender::rolling;
    use tracing_subscriber::Layer;

    const RUN_PREFIX: &str = "run_";
    const RUN_FORMAT: &str = "%Y%m%d_%H%M%S";

    pub(super) struct FileLayers {
        pub layers: Vec<BoxedLayer>,
        pub guards: Vec<WorkerGuard>,
        pub run_folder: PathBuf,
    }

    pub(super) fn file_layers(
        base_dir: &Path,
        directives: &str,
        retention_runs: usize,
    ) -> Result<FileLayers> {
        let run_folder = base_dir.join(format!(
            "{}{}",
            RUN_PREFIX,
            Utc::now().format(RUN_FORMAT)
        ));
        std::fs::create_dir_all(&run_folder)
            .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;
        cleanup_old_runs(base_dir, retention_runs)?;

        let mut layers = Vec::new();
        let mut guards = Vec::new();

        // One file per crate, then a combined file
        let mut targets: Vec<(String, String)> = crate::KNOWN_CRATES
            .iter()
            .map(|name| (format!("{}.log", name), format!("{}=debug,off", name)))
            .collect();
        targets.push(("cxbuild.log".to_string(), directives.to_string()));

        for (file_name, filter) in targets {
            let (writer, guard) = tracing_appender::non_blocking(rolling::never(&run_folder, file_name));
            guards.push(guard);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json()
                    .with_filter(env_filter(&filter)?)
                    .boxed(),
            );
        }

        Ok(FileLayers {
            layers,
            guards,
            run_folder,
        })
    }

    /// Remove all but the newest `retention_runs` run folders
    pub(super) fn cleanup_old_runs(base_dir: &Path, retention_runs: usize) -> Result<()> {
        let mut runs: Vec<(NaiveDateTime, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(base_dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let stamp = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(RUN_PREFIX))
                .and_then(|s| NaiveDateTime::parse_from_str(s, RUN_FORMAT).ok());
            if let Some(stamp) = stamp {
                runs.push((stamp, path));
            }
        }

        runs.sort_by_key(|(stamp, _)| *stamp);
        let excess = runs.len().saturating_sub(retention_runs);
        for (_, path) in runs.iter().take(excess) {
            if let Err(e) = std::fs::remove_dir_all(path) {
                eprintln!(
                    "Warning: Failed to remove old log directory {}: {}",
                    path.display(),
                    e
                );
            }
        }
        Ok(())
    }

}
