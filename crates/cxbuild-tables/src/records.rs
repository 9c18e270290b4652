// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Typed rows of the reference tables

use crate::{split_list, TablesError, TablesResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Accepts `"0.5, 1"` as well as a bare JSON or CSV number
fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Text(String),
        Number(f64),
    }

    Ok(match Cell::deserialize(deserializer)? {
        Cell::Text(text) => text,
        Cell::Number(number) => number.to_string(),
    })
}

fn parse_numbers(cell: &str, table: &str) -> TablesResult<Vec<f64>> {
    split_list(cell)
        .iter()
        .map(|item| {
            item.parse::<f64>().map_err(|_| TablesError::Malformed {
                table: table.to_string(),
                message: format!("'{}' is not a number", item),
            })
        })
        .collect()
}

/// Row of the layer name mapping: one survey sublayer (`csv_layers`) with the
/// coarser names it is known by and its share of the census layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerMappingRecord {
    pub csv_layers: String,
    #[serde(default)]
    pub down_mapping1: Option<String>,
    #[serde(default)]
    pub down_mapping2: Option<String>,
    #[serde(default)]
    pub down_mapping3: Option<String>,
    pub sub_proportion: f64,
    /// Census layer this sublayer's counts come from
    #[serde(rename = "table2_df", alias = "census_layer", default)]
    pub census_layer: Option<String>,
}

impl LayerMappingRecord {
    /// Names a requested layer may match: down mappings first, then the sublayer itself
    pub fn search_names(&self) -> impl Iterator<Item = &str> {
        [
            self.down_mapping1.as_deref(),
            self.down_mapping2.as_deref(),
            self.down_mapping3.as_deref(),
            Some(self.csv_layers.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|name| !name.is_empty())
    }
}

/// Per-layer census row (`table2_data`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensusRecord {
    pub layer: String,
    pub n_neurons_10e6: f64,
    pub percent_inhibitory: f64,
}

/// Row of a neuroinformatics connection strength table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    #[serde(rename = "FromArea")]
    pub from_area: String,
    #[serde(rename = "ToArea")]
    pub to_area: String,
    #[serde(rename = "FromLayer")]
    pub from_layer: String,
    #[serde(rename = "ToLayer")]
    pub to_layer: String,
    /// D, M or S
    #[serde(rename = "Strength")]
    pub strength: String,
    #[serde(rename = "References", default)]
    pub references: Option<String>,
}

/// Which postsynaptic classes a presynaptic class may contact, with weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactPermissionRecord {
    #[serde(rename = "Presynaptic Cell Types")]
    pub presynaptic: String,
    #[serde(rename = "Postsynaptic Cell Types")]
    pub postsynaptic: String,
    #[serde(rename = "Postsynaptic Cell Weights", deserialize_with = "text_or_number")]
    pub weights: String,
}

impl ContactPermissionRecord {
    /// `(postsynaptic class, weight)` pairs in table order
    pub fn permitted(&self) -> TablesResult<Vec<(String, f64)>> {
        let types = split_list(&self.postsynaptic);
        let weights = parse_numbers(&self.weights, "contact permissions")?;
        if types.len() != weights.len() {
            return Err(TablesError::Malformed {
                table: "contact permissions".to_string(),
                message: format!(
                    "{}: {} postsynaptic types but {} weights",
                    self.presynaptic,
                    types.len(),
                    weights.len()
                ),
            });
        }
        Ok(types.into_iter().zip(weights).collect())
    }
}

/// Compartment targeting distribution for one presynaptic class:
/// basal, soma, apical at soma layer, apical proximal, apical distal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentRuleRecord {
    #[serde(rename = "Presynaptic Cell Types")]
    pub presynaptic: String,
    #[serde(rename = "Distribution", deserialize_with = "text_or_number")]
    pub distribution: String,
}

impl CompartmentRuleRecord {
    pub fn weights(&self) -> TablesResult<[f64; 5]> {
        let values = parse_numbers(&self.distribution, "compartment rules")?;
        values.try_into().map_err(|values: Vec<f64>| TablesError::Malformed {
            table: "compartment rules".to_string(),
            message: format!(
                "{}: distribution needs 5 values, got {}",
                self.presynaptic,
                values.len()
            ),
        })
    }
}

/// Single-cell annotation row of the Allen transcriptomic census
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllenAnnotationRecord {
    pub region_label: String,
    pub class_label: String,
    pub subclass_label: String,
    pub cortical_layer_label: String,
}

/// One layer of the HBP/Markram layer download
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkramLayerStats {
    /// `"<layer>_<mtype>"` -> neuron count
    #[serde(rename = "No. of neurons per morphological types", default)]
    pub neurons_per_mtype: BTreeMap<String, f64>,
}

/// Layer -> statistics, as in `layer_download.json`
pub type MarkramCensus = BTreeMap<String, MarkramLayerStats>;
