// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `cxbuild_configuration.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CxBuildConfig {
    pub paths: PathsConfig,
    pub area: AreaConfig,
    pub layers: LayersConfig,
    pub cell_types: CellTypesConfig,
    pub background: BackgroundConfig,
    pub connections: ConnectionsConfig,
    pub input: InputConfig,
    pub anatomy: AnatomyConfig,
    pub logging: LoggingConfig,
}

/// Input directories and reference table file names
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub tables_dir: PathBuf,
    pub ni_csv_dir: PathBuf,
    pub config_files_dir: PathBuf,
    pub area_stats_file: String,
    pub census_file: String,
    pub layer_mapping_file: String,
    pub apical_dendrites_file: String,
    pub ephys_templates_file: String,
    pub excitatory_connections_file: String,
    pub inhibitory_connections_file: String,
    pub compartment_rules_file: String,
    pub contact_permissions_file: String,
    pub anatomy_file: String,
    pub physiology_file: String,
    /// Appended to the anatomy/physiology file stems for the generated copies
    pub output_suffix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tables_dir: PathBuf::from("tables"),
            ni_csv_dir: PathBuf::from("ni_csv_copy"),
            config_files_dir: PathBuf::from("config_files"),
            area_stats_file: "table1_data.csv".to_string(),
            census_file: "table2_data.csv".to_string(),
            layer_mapping_file: "layer_name_mapping_V1.csv".to_string(),
            apical_dendrites_file: "PC_apical_dendrites.csv".to_string(),
            ephys_templates_file: "neuron_group_ephys_templates.csv".to_string(),
            excitatory_connections_file: "connections_local_excitatory.csv".to_string(),
            inhibitory_connections_file: "connections_local_inhibitory.csv".to_string(),
            compartment_rules_file: "post_syn_compartments.csv".to_string(),
            contact_permissions_file: "post_syn_target_celltypes.csv".to_string(),
            anatomy_file: "pytest_anatomy_config.csv".to_string(),
            physiology_file: "pytest_physiology_config.csv".to_string(),
            output_suffix: "_cxc".to_string(),
        }
    }
}

impl PathsConfig {
    /// Path of a reference table under `tables_dir`
    pub fn table(&self, file_name: &str) -> PathBuf {
        self.tables_dir.join(file_name)
    }

    /// Path of a neuroinformatics connection table under `ni_csv_dir`
    pub fn ni_table(&self, file_name: &str) -> PathBuf {
        self.ni_csv_dir.join(file_name)
    }

    /// Path of an anatomy/physiology file under `config_files_dir`
    pub fn config_file(&self, file_name: &str) -> PathBuf {
        self.config_files_dir.join(file_name)
    }

    /// Output path for a generated copy of `file_name`: `<stem><suffix>.csv`
    pub fn output_file(&self, file_name: &str) -> PathBuf {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        self.config_files_dir
            .join(format!("{}{}.csv", stem, self.output_suffix))
    }
}

/// Simulated cortical area and its visual-field patch
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AreaConfig {
    pub name: String,
    pub visual_field_radius_deg: f64,
    pub center_eccentricity_deg: f64,
    /// Cortical magnification `M(E) = 1 / (a + b * E)` mm/deg
    pub magnification_a: f64,
    pub magnification_b: f64,
    /// Row of the area statistics table holding the total area
    pub area_stat_row: String,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            name: "V1".to_string(),
            visual_field_radius_deg: 0.1,
            center_eccentricity_deg: 5.0,
            magnification_a: 0.077,
            magnification_b: 0.082,
            area_stat_row: "mean".to_string(),
        }
    }
}

/// Requested cortical layers in build order
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LayersConfig {
    pub requested: Vec<String>,
}

impl Default for LayersConfig {
    fn default() -> Self {
        Self {
            requested: ["L1", "L23", "L4A", "L4B", "L4CA", "L5", "L6"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Cell types and where their per-layer proportions come from
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CellTypesConfig {
    pub excitatory_types: Vec<String>,
    pub inhibitory_types: Vec<String>,
    /// Layer -> proportions aligned with `excitatory_types`. Empty means derived.
    pub excitatory_proportions: BTreeMap<String, Vec<f64>>,
    /// Layer -> proportions aligned with `inhibitory_types`. Empty means derived.
    pub inhibitory_proportions: BTreeMap<String, Vec<f64>>,
    /// "" (uniform), "HBP", "Markram" or "Allen"
    pub data_source: String,
    /// Census folder under `tables_dir`; empty selects the source default
    pub data_folder: String,
    /// Census file name; empty selects the source default
    pub data_file: String,
}

impl Default for CellTypesConfig {
    fn default() -> Self {
        Self {
            excitatory_types: vec!["SS".to_string()],
            inhibitory_types: vec!["MC".to_string(), "BC".to_string()],
            excitatory_proportions: BTreeMap::new(),
            inhibitory_proportions: BTreeMap::new(),
            data_source: String::new(),
            data_folder: String::new(),
            data_file: String::new(),
        }
    }
}

/// Selectors accepted by `cell_types.data_source`
pub const KNOWN_DATA_SOURCES: &[&str] = &["", "HBP", "Markram", "Allen"];

impl CellTypesConfig {
    /// Census file for the selected data source, relative to `tables_dir`
    pub fn census_path(&self) -> Option<PathBuf> {
        let (default_folder, default_file) = match self.data_source.as_str() {
            "HBP" | "Markram" => ("hbp_data", "layer_download.json"),
            "Allen" => ("allen_data", "sample_annotations.csv"),
            _ => return None,
        };
        let folder = if self.data_folder.is_empty() {
            default_folder
        } else {
            self.data_folder.as_str()
        };
        let file = if self.data_file.is_empty() {
            default_file
        } else {
            self.data_file.as_str()
        };
        Some(Path::new(folder).join(file))
    }
}

/// Background input and monitor settings written into every group row
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub monitors: String,
    pub excitatory_inputs: u32,
    pub excitatory_inhibition: u32,
    pub inhibitory_inputs: u32,
    pub inhibitory_inhibition: u32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            monitors: "[Sp]".to_string(),
            excitatory_inputs: 630,
            excitatory_inhibition: 290,
            inhibitory_inputs: 500,
            inhibitory_inhibition: 180,
        }
    }
}

/// Connection normalization and synapse table settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionsConfig {
    /// Down-map connection data through every matching sublayer, not only claimed ones
    pub use_all_csv_data: bool,
    /// Hard ceiling on generated synapse rows
    pub max_synapse_rows: usize,
    pub synapses_per_connection: u32,
    pub synapse_type: String,
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            use_all_csv_data: true,
            max_synapse_rows: 1000,
            synapses_per_connection: 1,
            synapse_type: "Depressing".to_string(),
        }
    }
}

/// External input pseudo-group projection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    pub target_layer: String,
    pub connection_probability: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            target_layer: "L4C".to_string(),
            connection_probability: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnatomyConfig {
    /// Replace the existing group/synapse sections instead of appending to them
    pub replace_existing_groups: bool,
}

impl Default for AnatomyConfig {
    fn default() -> Self {
        Self {
            replace_existing_groups: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Crates to log at debug level, e.g. `["cxbuild-development"]`
    pub debug_crates: Vec<String>,
    pub file_logging: bool,
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            debug_crates: Vec::new(),
            file_logging: false,
            log_dir: PathBuf::from("./logs"),
        }
    }
}
