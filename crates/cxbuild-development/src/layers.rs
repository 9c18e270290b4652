// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Layer ontology mapping.

Three layer vocabularies meet here: the layers a build requests (`L4CA`,
`L23`), the survey sublayers of the connection tables (`4Ca`, `2/3`) and the
census layers of the population table. The mapping table ties them together:
each row is one survey sublayer with up to three coarser names it answers to
and the fraction of the census layer it covers.

Two mappings are derived per build:

- **groups**: every sublayer is claimed by at most one requested layer. A row
  joins a requested layer only when none of its search names has already been
  claimed as a sublayer, so the first requested layer (in request order)
  wins. Population math uses this mapping.
- **full**: every row mentioning a requested layer joins it. Connection
  normalization may use this mapping to keep all survey granularity.
*/

use crate::types::{BuildResult, ConfigurationError, LayerIdx};
use cxbuild_tables::LayerMappingRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};

/// A requested layer and its 1-based index in request order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerSpec {
    pub name: String,
    pub idx: LayerIdx,
}

/// One survey sublayer attributed to a requested layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerMapping {
    pub layer: LayerSpec,
    /// Survey sublayer name used by the connection tables
    pub csv_layer: String,
    /// Census layer the sublayer's density comes from
    pub census_layer: String,
    pub sub_proportion: f64,
}

/// Which mapping a lookup should use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingScope {
    Groups,
    Full,
}

/// Requested layers reconciled against the layer mapping table
#[derive(Debug, Clone)]
pub struct LayerOntology {
    layers: Vec<LayerSpec>,
    valid_names: BTreeSet<String>,
    groups: Vec<LayerMapping>,
    full: Vec<LayerMapping>,
}

impl LayerOntology {
    /// Map `requested` layers onto the rows of the layer mapping table
    ///
    /// # Errors
    /// A requested name that is neither a sublayer nor a down-mapping name.
    pub fn map(requested: &[String], records: &[LayerMappingRecord]) -> BuildResult<Self> {
        let valid_names = Self::valid_names(records);
        for layer in requested {
            if !valid_names.contains(layer) {
                return Err(ConfigurationError::UnknownLayer {
                    layer: layer.clone(),
                    valid: valid_names.iter().cloned().collect(),
                }
                .into());
            }
        }

        let layers: Vec<LayerSpec> = requested
            .iter()
            .enumerate()
            .map(|(i, name)| LayerSpec {
                name: name.clone(),
                idx: i + 1,
            })
            .collect();

        let mut groups = Vec::new();
        let mut full = Vec::new();
        let mut claimed: HashSet<String> = HashSet::new();

        for layer in &layers {
            for record in records {
                if !record.search_names().any(|name| name == layer.name) {
                    continue;
                }
                let mapping = LayerMapping {
                    layer: layer.clone(),
                    csv_layer: record.csv_layers.trim().to_string(),
                    census_layer: record
                        .census_layer
                        .as_deref()
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .unwrap_or_else(|| record.csv_layers.trim())
                        .to_string(),
                    sub_proportion: record.sub_proportion,
                };

                if record.search_names().all(|name| !claimed.contains(name)) {
                    claimed.insert(mapping.csv_layer.clone());
                    groups.push(mapping.clone());
                } else {
                    debug!(target: "cxbuild-development",
                        "   Sublayer {} already claimed, {} keeps it for connections only",
                        mapping.csv_layer, layer.name);
                }
                full.push(mapping);
            }
        }

        info!(target: "cxbuild-development",
            "🗺️  Mapped {} requested layers onto {} sublayers ({} incl. shared)",
            layers.len(), groups.len(), full.len());

        Ok(Self {
            layers,
            valid_names,
            groups,
            full,
        })
    }

    /// Every name a build may request: sublayers plus all down-mapping names
    pub fn valid_names(records: &[LayerMappingRecord]) -> BTreeSet<String> {
        records
            .iter()
            .flat_map(|record| record.search_names())
            .map(str::to_string)
            .collect()
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn known_names(&self) -> &BTreeSet<String> {
        &self.valid_names
    }

    pub fn index_of(&self, name: &str) -> Option<LayerIdx> {
        self.layers.iter().find(|l| l.name == name).map(|l| l.idx)
    }

    pub fn name_of(&self, idx: LayerIdx) -> Option<&str> {
        self.layers
            .iter()
            .find(|l| l.idx == idx)
            .map(|l| l.name.as_str())
    }

    /// Index of a requested layer, or an unknown-layer error
    pub fn require_index(&self, name: &str) -> BuildResult<LayerIdx> {
        self.index_of(name).ok_or_else(|| {
            ConfigurationError::UnknownLayer {
                layer: name.to_string(),
                valid: self.layers.iter().map(|l| l.name.clone()).collect(),
            }
            .into()
        })
    }

    pub fn mappings(&self, scope: MappingScope) -> &[LayerMapping] {
        match scope {
            MappingScope::Groups => &self.groups,
            MappingScope::Full => &self.full,
        }
    }

    /// Rows attributed to one requested layer
    pub fn mappings_for<'a>(
        &'a self,
        layer: &'a str,
        scope: MappingScope,
    ) -> impl Iterator<Item = &'a LayerMapping> + 'a {
        self.mappings(scope)
            .iter()
            .filter(move |m| m.layer.name == layer)
    }

    /// Survey sublayer name -> (layer index, sub-proportion)
    ///
    /// A sublayer shared by several requested layers resolves to the last one.
    pub fn sublayer_lookup(&self, scope: MappingScope) -> BTreeMap<&str, (LayerIdx, f64)> {
        self.mappings(scope)
            .iter()
            .map(|m| (m.csv_layer.as_str(), (m.layer.idx, m.sub_proportion)))
            .collect()
    }

    /// Indices that own at least one sublayer in the groups mapping
    pub fn group_indices(&self) -> BTreeSet<LayerIdx> {
        self.groups.iter().map(|m| m.layer.idx).collect()
    }
}
