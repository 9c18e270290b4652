// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Checks that values are within range and consistent with each other before
//! any table is read.

use crate::types::KNOWN_DATA_SOURCES;
use crate::{ConfigError, ConfigResult, CxBuildConfig};
use std::collections::{BTreeMap, HashSet};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    DuplicateValue { field: String, value: String },
    LengthMismatch { field: String, expected: usize, actual: usize },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::DuplicateValue { field, value } => {
                write!(f, "{} lists '{}' more than once", field, value)
            }
            Self::LengthMismatch {
                field,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "{} has {} values but {} cell types are configured",
                    field, actual, expected
                )
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &CxBuildConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_layers(config, &mut errors);
    validate_area(config, &mut errors);
    validate_cell_types(config, &mut errors);
    validate_connections(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_layers(config: &CxBuildConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.layers.requested.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "layers.requested".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for layer in &config.layers.requested {
        if !seen.insert(layer.as_str()) {
            errors.push(ConfigValidationError::DuplicateValue {
                field: "layers.requested".to_string(),
                value: layer.clone(),
            });
        }
    }
}

fn validate_area(config: &CxBuildConfig, errors: &mut Vec<ConfigValidationError>) {
    let area = &config.area;
    if area.name.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "area.name".to_string(),
        });
    }
    if area.visual_field_radius_deg.is_nan() || area.visual_field_radius_deg <= 0.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "area.visual_field_radius_deg".to_string(),
            reason: format!("must be > 0, got {}", area.visual_field_radius_deg),
        });
    }
    // ln(1 + E - r) must be defined
    if 1.0 + area.center_eccentricity_deg - area.visual_field_radius_deg <= 0.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "area.center_eccentricity_deg".to_string(),
            reason: "patch extends past the magnification model's origin".to_string(),
        });
    }
}

fn validate_proportion_table(
    field: &str,
    types: &[String],
    proportions: &BTreeMap<String, Vec<f64>>,
    requested: &[String],
    errors: &mut Vec<ConfigValidationError>,
) {
    if proportions.is_empty() {
        return;
    }

    let configured: HashSet<&str> = proportions.keys().map(String::as_str).collect();
    let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();
    if configured != wanted {
        errors.push(ConfigValidationError::InvalidValue {
            field: field.to_string(),
            reason: "layers must match layers.requested exactly".to_string(),
        });
    }

    for (layer, values) in proportions {
        if values.len() != types.len() {
            errors.push(ConfigValidationError::LengthMismatch {
                field: format!("{}.{}", field, layer),
                expected: types.len(),
                actual: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("{}.{}", field, layer),
                reason: "proportions must be finite and non-negative".to_string(),
            });
        }
    }
}

fn validate_cell_types(config: &CxBuildConfig, errors: &mut Vec<ConfigValidationError>) {
    let cell_types = &config.cell_types;
    if cell_types.excitatory_types.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "cell_types.excitatory_types".to_string(),
        });
    }
    if cell_types.inhibitory_types.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "cell_types.inhibitory_types".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for name in cell_types
        .excitatory_types
        .iter()
        .chain(cell_types.inhibitory_types.iter())
    {
        if !seen.insert(name.as_str()) {
            errors.push(ConfigValidationError::DuplicateValue {
                field: "cell_types".to_string(),
                value: name.clone(),
            });
        }
    }

    validate_proportion_table(
        "cell_types.excitatory_proportions",
        &cell_types.excitatory_types,
        &cell_types.excitatory_proportions,
        &config.layers.requested,
        errors,
    );
    validate_proportion_table(
        "cell_types.inhibitory_proportions",
        &cell_types.inhibitory_types,
        &cell_types.inhibitory_proportions,
        &config.layers.requested,
        errors,
    );

    if !KNOWN_DATA_SOURCES.contains(&cell_types.data_source.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "cell_types.data_source".to_string(),
            reason: format!(
                "unknown selector '{}', expected one of \"\", HBP, Markram, Allen",
                cell_types.data_source
            ),
        });
    }
}

fn validate_connections(config: &CxBuildConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.connections.max_synapse_rows == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "connections.max_synapse_rows".to_string(),
            reason: "must be > 0".to_string(),
        });
    }
    if config.connections.synapses_per_connection == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "connections.synapses_per_connection".to_string(),
            reason: "must be > 0".to_string(),
        });
    }
    let p = config.input.connection_probability;
    if !(0.0..=1.0).contains(&p) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "input.connection_probability".to_string(),
            reason: format!("must be within [0, 1], got {}", p),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_layers_rejected() {
        let mut config = CxBuildConfig::default();
        config.layers.requested = vec!["L23".to_string(), "L23".to_string()];
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("'L23' more than once"));
    }

    #[test]
    fn test_proportion_length_mismatch() {
        let mut config = CxBuildConfig::default();
        config.layers.requested = vec!["L1".to_string()];
        config
            .cell_types
            .inhibitory_proportions
            .insert("L1".to_string(), vec![1.0]);
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("has 1 values but 2 cell types"));
    }

    #[test]
    fn test_proportion_layers_must_match_request() {
        let mut config = CxBuildConfig::default();
        config.layers.requested = vec!["L1".to_string(), "L23".to_string()];
        config
            .cell_types
            .excitatory_proportions
            .insert("L1".to_string(), vec![1.0]);
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("must match layers.requested"));
    }

    #[test]
    fn test_unknown_data_source() {
        let mut config = CxBuildConfig::default();
        config.cell_types.data_source = "Gallant".to_string();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("unknown selector 'Gallant'"));
    }

    #[test]
    fn test_errors_are_collected() {
        let mut config = CxBuildConfig::default();
        config.layers.requested.clear();
        config.connections.max_synapse_rows = 0;
        config.area.visual_field_radius_deg = -1.0;
        let err = validate_config(&config).unwrap_err().to_string();
        assert_eq!(err.matches("  - ").count(), 3);
    }
}
