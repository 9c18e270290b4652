// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later ones win:
//! 1. TOML file (base values, section defaults for anything omitted)
//! 2. Environment variables
//! 3. CLI arguments

use crate::{ConfigError, ConfigResult, CxBuildConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "cxbuild_configuration.toml";

/// Find the build configuration file
///
/// Search order:
/// 1. `CXBUILD_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("CXBUILD_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by CXBUILD_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet CXBUILD_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from a TOML file and apply overrides
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, the file is searched for.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the config file is not found or contains invalid TOML.
/// Validation is a separate step, see [`crate::validate_config`].
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<CxBuildConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: CxBuildConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "true" || value == "1" || value == "yes"
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `CXBUILD_TABLES_DIR` -> `paths.tables_dir`
/// - `CXBUILD_NI_CSV_DIR` -> `paths.ni_csv_dir`
/// - `CXBUILD_CONFIG_FILES_DIR` -> `paths.config_files_dir`
/// - `CXBUILD_AREA_NAME` -> `area.name`
/// - `CXBUILD_VF_RADIUS` -> `area.visual_field_radius_deg`
/// - `CXBUILD_MAX_SYNAPSE_ROWS` -> `connections.max_synapse_rows`
/// - `CXBUILD_USE_ALL_CSV_DATA` -> `connections.use_all_csv_data`
/// - `CXBUILD_LOG_LEVEL` -> `logging.level`
///
/// Unparseable numeric values are ignored.
pub fn apply_environment_overrides(config: &mut CxBuildConfig) {
    if let Ok(value) = env::var("CXBUILD_TABLES_DIR") {
        config.paths.tables_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("CXBUILD_NI_CSV_DIR") {
        config.paths.ni_csv_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("CXBUILD_CONFIG_FILES_DIR") {
        config.paths.config_files_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("CXBUILD_AREA_NAME") {
        config.area.name = value;
    }
    if let Ok(value) = env::var("CXBUILD_VF_RADIUS") {
        if let Ok(radius) = value.parse::<f64>() {
            config.area.visual_field_radius_deg = radius;
        }
    }
    if let Ok(value) = env::var("CXBUILD_MAX_SYNAPSE_ROWS") {
        if let Ok(rows) = value.parse::<usize>() {
            config.connections.max_synapse_rows = rows;
        }
    }
    if let Ok(value) = env::var("CXBUILD_USE_ALL_CSV_DATA") {
        config.connections.use_all_csv_data = parse_flag(&value);
    }
    if let Ok(value) = env::var("CXBUILD_LOG_LEVEL") {
        config.logging.level = value;
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - e.g. `{"layers": "L23,L5", "max_synapse_rows": "2000"}`
///
/// # Errors
///
/// Explicit user overrides must parse; a bad value is `ConfigError::InvalidValue`.
pub fn apply_cli_overrides(
    config: &mut CxBuildConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    if let Some(value) = cli_args.get("tables_dir") {
        config.paths.tables_dir = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("config_files_dir") {
        config.paths.config_files_dir = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("anatomy_file") {
        config.paths.anatomy_file = value.clone();
    }
    if let Some(value) = cli_args.get("physiology_file") {
        config.paths.physiology_file = value.clone();
    }
    if let Some(value) = cli_args.get("area") {
        config.area.name = value.clone();
    }
    if let Some(value) = cli_args.get("vf_radius") {
        config.area.visual_field_radius_deg = value.parse::<f64>().map_err(|_| {
            ConfigError::InvalidValue(format!("vf_radius must be a number, got '{}'", value))
        })?;
    }
    if let Some(value) = cli_args.get("layers") {
        config.layers.requested = value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(value) = cli_args.get("data_source") {
        config.cell_types.data_source = value.clone();
    }
    if let Some(value) = cli_args.get("max_synapse_rows") {
        config.connections.max_synapse_rows = value.parse::<usize>().map_err(|_| {
            ConfigError::InvalidValue(format!(
                "max_synapse_rows must be a positive integer, got '{}'",
                value
            ))
        })?;
    }
    if let Some(value) = cli_args.get("use_all_csv_data") {
        config.connections.use_all_csv_data = parse_flag(value);
    }
    if let Some(value) = cli_args.get("append") {
        config.anatomy.replace_existing_groups = !parse_flag(value);
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
    Ok(())
}
