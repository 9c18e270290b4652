// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Cortical Circuit Builder

Extends an anatomy/physiology configuration pair with the neuron groups and
synapses of the configured cortical area.

Usage:
  cargo run --bin cxbuild -- --config cxbuild_configuration.toml [--layers L23,L4C,L5] [--append]

Outputs `<anatomy>_cxc.csv` and `<physiology>_cxc.csv` next to the inputs.

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use anyhow::{Context, Result};
use clap::Parser;
use cxbuild::config::{load_config, validate_config, CxBuildConfig};
use cxbuild::development::{BuildInputs, BuildSession};
use cxbuild::observability::{init_logging, parse_debug_flags, LoggingConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

/// Cortical circuit builder - neuron groups and synapses from survey tables
#[derive(Parser, Debug)]
#[command(name = "cxbuild", version, author, long_about = None)]
struct Args {
    /// Configuration file (default: CXBUILD_CONFIG_PATH or ./cxbuild_configuration.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reference table directory
    #[arg(long)]
    tables_dir: Option<String>,

    /// Directory of the anatomy and physiology tables
    #[arg(long)]
    config_files_dir: Option<String>,

    /// Anatomy table file name
    #[arg(long)]
    anatomy_file: Option<String>,

    /// Physiology table file name
    #[arg(long)]
    physiology_file: Option<String>,

    /// Cortical area, e.g. "V1"
    #[arg(long)]
    area: Option<String>,

    /// Visual field radius in degrees
    #[arg(long)]
    vf_radius: Option<String>,

    /// Requested layers (comma-separated, e.g., "L23,L4C,L5")
    #[arg(long)]
    layers: Option<String>,

    /// Cell type census: "", "HBP", "Markram" or "Allen"
    #[arg(long)]
    data_source: Option<String>,

    /// Synapse row capacity
    #[arg(long)]
    max_synapse_rows: Option<String>,

    /// Keep existing neuron groups and append the new ones
    #[arg(long, default_value_t = false)]
    append: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable debug logging for a crate (repeatable)
    #[arg(long = "debug", value_name = "CRATE")]
    debug: Vec<String>,

    /// Enable debug logging for all crates
    #[arg(long, default_value_t = false)]
    debug_all: bool,
}

impl Args {
    /// Overrides in the form `apply_cli_overrides` expects
    fn overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        let optional = [
            ("tables_dir", &self.tables_dir),
            ("config_files_dir", &self.config_files_dir),
            ("anatomy_file", &self.anatomy_file),
            ("physiology_file", &self.physiology_file),
            ("area", &self.area),
            ("vf_radius", &self.vf_radius),
            ("layers", &self.layers),
            ("data_source", &self.data_source),
            ("max_synapse_rows", &self.max_synapse_rows),
            ("log_level", &self.log_level),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                overrides.insert(key.to_string(), value.clone());
            }
        }
        if self.append {
            overrides.insert("append".to_string(), "true".to_string());
        }
        overrides
    }
}

fn logging_config(config: &CxBuildConfig) -> LoggingConfig {
    LoggingConfig {
        level: config.logging.level.clone(),
        log_dir: config
            .logging
            .file_logging
            .then(|| config.logging.log_dir.clone()),
        ..LoggingConfig::default()
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = args.overrides();
    let config = load_config(args.config.as_deref(), Some(&overrides))
        .context("Failed to load configuration")?;
    validate_config(&config).context("Invalid configuration")?;

    let mut debug_flags = parse_debug_flags();
    if args.debug_all {
        debug_flags.enable_all();
    }
    for crate_name in args.debug.iter().chain(&config.logging.debug_crates) {
        debug_flags.enable(crate_name);
    }
    let _logging = init_logging(&debug_flags, &logging_config(&config))?;

    info!(target: "cxbuild", "🧬 cxbuild {}", cxbuild::development::VERSION);
    info!(target: "cxbuild", "📂 Tables:  {}", config.paths.tables_dir.display());
    info!(target: "cxbuild", "📂 Configs: {}", config.paths.config_files_dir.display());

    let inputs = BuildInputs::load(&config).context("Failed to load input tables")?;
    let mut session = BuildSession::new(config.clone());
    let output = session.run(&inputs)?;
    let (anatomy, physiology) = output.write(&config)?;

    let progress = session.progress();
    info!(target: "cxbuild", "✅ {} groups ({} neurons), {} synapse rows in {}ms",
        progress.groups_created, progress.neurons_created,
        progress.synapses_created, progress.duration_ms);
    info!(target: "cxbuild", "💾 Anatomy:    {}", anatomy.display());
    info!(target: "cxbuild", "💾 Physiology: {}", physiology.display());
    Ok(())
}
