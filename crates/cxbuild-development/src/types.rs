// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Core types for circuit development.
*/

use cxbuild_tables::TablesError;

/// Group identity within one build; 0 is the external input pseudo-group
pub type GroupIdx = usize;

/// Requested layer index; 0 is the external input pseudo-layer
pub type LayerIdx = usize;

/// Result type for development operations
pub type BuildResult<T> = Result<T, BuildError>;

/// Inputs that do not describe a buildable circuit; the tables or the
/// configuration have to be extended before the build can succeed
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Unknown layer '{layer}'. Valid layer names are: {}", .valid.join(", "))]
    UnknownLayer { layer: String, valid: Vec<String> },

    #[error("Layer '{0}' has no down-mapped census rows (zero neuron density)")]
    EmptyDownMapping(String),

    #[error("Layer '{0}' not found in the apical dendrite table, add a matching row")]
    MissingApicalLayer(String),

    #[error("Pyramidal type '{subtype}' has no apical dendrite entry for layer '{layer}'")]
    MissingApicalSubtype { layer: String, subtype: String },

    #[error("Invalid apical extent '{extent}' for {layer}_{subtype}: {reason}")]
    InvalidApicalExtent {
        layer: String,
        subtype: String,
        extent: String,
        reason: String,
    },

    #[error("Synapse capacity exceeded: {needed} rows needed but max_synapse_rows is {capacity}")]
    SynapseCapacityExceeded { needed: usize, capacity: usize },

    #[error("Missing section marker '{marker}' in {table}")]
    MissingSectionMarker { marker: String, table: String },

    #[error("Anatomy table has no '{0}' rows to take the column layout from")]
    MissingAnatomySection(String),

    #[error("Unknown cell type data source '{0}' (expected '', 'HBP', 'Markram' or 'Allen')")]
    UnknownDataSource(String),

    #[error("{class} proportions must cover exactly the requested layers: {detail}")]
    ProportionLayersMismatch { class: String, detail: String },

    #[error("Neuron type '{0}' has no ephys template (point or compartmental)")]
    UnknownNeuronType(String),

    #[error("No compartment targeting rule for presynaptic class '{0}'")]
    MissingCompartmentRule(String),

    #[error("Duplicate neuron subtype '{0}'")]
    DuplicateSubtype(String),

    #[error("Invalid area geometry: {0}")]
    InvalidAreaGeometry(String),

    #[error("Input target layer '{0}' is not among the requested layers")]
    InputTargetNotRequested(String),
}

/// Errors that can occur while building a circuit
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Data shape error: {0}")]
    DataShape(String),

    #[error(transparent)]
    Tables(#[from] TablesError),
}

impl BuildError {
    pub fn data_shape(message: impl Into<String>) -> Self {
        BuildError::DataShape(message.into())
    }
}
