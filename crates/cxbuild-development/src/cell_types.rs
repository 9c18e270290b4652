// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Cell types and their per-layer proportions.

A [`CellType`] carries its [`CellClass`] from construction on; nothing
downstream inspects type names to decide whether a type is pyramidal.

[`CellTypeProportions`] holds one class (excitatory or inhibitory) with one
column per requested layer. Each column sums to 1, or to 0 when no requested
type of that class lives in the layer.
*/

use crate::types::{BuildError, BuildResult, ConfigurationError};
use cxbuild_tables::{AllenAnnotationRecord, MarkramCensus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Column sums within this distance of 0 or 1 are accepted
const SUM_TOLERANCE: f64 = 1e-6;

/// Neuron classes the downstream simulator knows, by label
pub const KNOWN_CELL_CLASSES: &[&str] =
    &["PC", "SS", "BC", "MC", "L1i", "VPM", "HH_I", "HH_E", "NDNEURON"];

/// Excitatory or inhibitory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transmitter {
    Excitatory,
    Inhibitory,
}

impl Transmitter {
    /// Class label used by transcriptomic census tables
    pub fn census_class(self) -> &'static str {
        match self {
            Transmitter::Excitatory => "Glutamatergic",
            Transmitter::Inhibitory => "GABAergic",
        }
    }
}

impl fmt::Display for Transmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transmitter::Excitatory => write!(f, "excitatory"),
            Transmitter::Inhibitory => write!(f, "inhibitory"),
        }
    }
}

/// Coarse neuron class
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellClass {
    /// Multi-compartment pyramidal cell with an apical dendrite
    Pyramidal,
    SpinyStellate,
    Basket,
    Martinotti,
    L1Inhibitory,
    ThalamicRelay,
    HodgkinHuxleyInhibitory,
    HodgkinHuxleyExcitatory,
    Nondescript,
    /// Not a simulator class; the label is the type name itself
    Other(String),
}

impl CellClass {
    fn from_known_label(label: &str) -> Option<Self> {
        Some(match label {
            "PC" => CellClass::Pyramidal,
            "SS" => CellClass::SpinyStellate,
            "BC" => CellClass::Basket,
            "MC" => CellClass::Martinotti,
            "L1i" => CellClass::L1Inhibitory,
            "VPM" => CellClass::ThalamicRelay,
            "HH_I" => CellClass::HodgkinHuxleyInhibitory,
            "HH_E" => CellClass::HodgkinHuxleyExcitatory,
            "NDNEURON" => CellClass::Nondescript,
            _ => return None,
        })
    }

    /// Resolve a type name: exact class label first, then a label followed
    /// only by a numeric suffix (`PC1` -> `PC`, but `SST` stays `SST`)
    pub fn resolve(type_name: &str) -> Self {
        Self::from_known_label(type_name)
            .or_else(|| {
                KNOWN_CELL_CLASSES
                    .iter()
                    .find(|label| {
                        type_name
                            .strip_prefix(*label)
                            .is_some_and(|suffix| suffix.chars().all(|c| c.is_ascii_digit()))
                    })
                    .and_then(|label| Self::from_known_label(label))
            })
            .unwrap_or_else(|| CellClass::Other(type_name.to_string()))
    }

    /// Class of a requested type: excitatory names may carry a numbered
    /// suffix, inhibitory names must match a label exactly
    pub fn for_transmitter(type_name: &str, transmitter: Transmitter) -> Self {
        match transmitter {
            Transmitter::Excitatory => Self::resolve(type_name),
            Transmitter::Inhibitory => Self::from_known_label(type_name)
                .unwrap_or_else(|| CellClass::Other(type_name.to_string())),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CellClass::Pyramidal => "PC",
            CellClass::SpinyStellate => "SS",
            CellClass::Basket => "BC",
            CellClass::Martinotti => "MC",
            CellClass::L1Inhibitory => "L1i",
            CellClass::ThalamicRelay => "VPM",
            CellClass::HodgkinHuxleyInhibitory => "HH_I",
            CellClass::HodgkinHuxleyExcitatory => "HH_E",
            CellClass::Nondescript => "NDNEURON",
            CellClass::Other(name) => name.as_str(),
        }
    }

    pub fn is_pyramidal(&self) -> bool {
        matches!(self, CellClass::Pyramidal)
    }

    /// Transmitter assumed for a group read back without its proportion table
    pub fn default_transmitter(&self) -> Transmitter {
        match self {
            CellClass::Basket
            | CellClass::Martinotti
            | CellClass::L1Inhibitory
            | CellClass::HodgkinHuxleyInhibitory => Transmitter::Inhibitory,
            _ => Transmitter::Excitatory,
        }
    }
}

/// A requested cell type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellType {
    /// Name as requested, e.g. `PC2`; used in subtype names
    pub name: String,
    pub class: CellClass,
    pub transmitter: Transmitter,
}

impl CellType {
    pub fn new(name: &str, transmitter: Transmitter) -> Self {
        Self {
            name: name.to_string(),
            class: CellClass::for_transmitter(name, transmitter),
            transmitter,
        }
    }

    pub fn is_pyramidal(&self) -> bool {
        self.class.is_pyramidal()
    }

    /// `neuron_type` column value
    pub fn neuron_type(&self) -> &str {
        self.class.label()
    }

    /// Name used by the contact and compartment rule tables: every pyramidal
    /// type collapses to `PC`
    pub fn contact_class(&self) -> &str {
        if self.is_pyramidal() {
            self.class.label()
        } else {
            self.name.as_str()
        }
    }
}

/// Where cell type proportions come from when none are given by hand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellTypeDataSource {
    /// 1/N for N requested types
    Uniform,
    /// HBP / Markram morphological type counts (JSON)
    Markram,
    /// Allen transcriptomic cell annotations (CSV)
    Allen,
}

impl FromStr for CellTypeDataSource {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(CellTypeDataSource::Uniform),
            "HBP" | "Markram" => Ok(CellTypeDataSource::Markram),
            "Allen" => Ok(CellTypeDataSource::Allen),
            other => Err(ConfigurationError::UnknownDataSource(other.to_string()).into()),
        }
    }
}

/// Loaded census data for a non-uniform source
#[derive(Debug, Clone)]
pub enum CellTypeCensus {
    Markram(MarkramCensus),
    Allen(Vec<AllenAnnotationRecord>),
}

/// Inhibitory molecular types and the morphological types counted under them
const MARKRAM_INHIBITORY_TYPES: &[(&str, &[&str])] = &[
    ("SST", &["MC"]),
    ("PVALB", &["NBC", "LBC"]),
    ("VIP", &["SBC", "BP", "DBC"]),
];

const ALLEN_REGION: &str = "V1C";

/// Census layer -> type -> proportion
pub type LayerTypeShares = BTreeMap<String, BTreeMap<String, f64>>;

impl CellTypeCensus {
    /// Per-layer type shares of one class, or `None` when the census has no
    /// data for the class and uniform proportions apply
    pub fn shares(&self, transmitter: Transmitter) -> Option<LayerTypeShares> {
        match self {
            CellTypeCensus::Markram(census) => match transmitter {
                Transmitter::Excitatory => None,
                Transmitter::Inhibitory => Some(Self::markram_inhibitory(census)),
            },
            CellTypeCensus::Allen(records) => Some(Self::allen(records, transmitter)),
        }
    }

    fn markram_inhibitory(census: &MarkramCensus) -> LayerTypeShares {
        let mut shares = LayerTypeShares::new();
        for (layer, stats) in census {
            let counts: Vec<(String, f64)> = MARKRAM_INHIBITORY_TYPES
                .iter()
                .map(|(molecular, morphological)| {
                    let count = morphological
                        .iter()
                        .filter_map(|m| stats.neurons_per_mtype.get(&format!("{}_{}", layer, m)))
                        .sum::<f64>();
                    (molecular.to_string(), count)
                })
                .collect();
            shares.insert(layer.clone(), normalized(counts).into_iter().collect());
        }
        shares
    }

    fn allen(records: &[AllenAnnotationRecord], transmitter: Transmitter) -> LayerTypeShares {
        let in_region: Vec<&AllenAnnotationRecord> = records
            .iter()
            .filter(|r| r.region_label == ALLEN_REGION)
            .collect();

        let mut counts: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for record in &in_region {
            counts.entry(record.cortical_layer_label.clone()).or_default();
        }
        for record in in_region
            .iter()
            .filter(|r| r.class_label == transmitter.census_class())
        {
            *counts
                .entry(record.cortical_layer_label.clone())
                .or_default()
                .entry(record.subclass_label.clone())
                .or_insert(0.0) += 1.0;
        }

        counts
            .into_iter()
            .map(|(layer, by_type)| {
                let by_type = normalized(by_type.into_iter().collect());
                (layer, by_type.into_iter().collect())
            })
            .collect()
    }
}

/// Scale counts to sum 1, keeping their order; an all-zero set stays all zero
fn normalized(counts: Vec<(String, f64)>) -> Vec<(String, f64)> {
    let total: f64 = counts.iter().map(|(_, c)| c).sum();
    counts
        .into_iter()
        .map(|(name, count)| {
            let share = if total > 0.0 { count / total } else { 0.0 };
            (name, share)
        })
        .collect()
}

/// Proportions of one class: `values[type][layer]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellTypeProportions {
    transmitter: Transmitter,
    types: Vec<CellType>,
    layers: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl CellTypeProportions {
    /// 1/N for every type in every layer
    pub fn uniform(transmitter: Transmitter, type_names: &[String], layers: &[String]) -> Self {
        let share = if type_names.is_empty() {
            0.0
        } else {
            1.0 / type_names.len() as f64
        };
        Self {
            transmitter,
            types: Self::cell_types(type_names, transmitter),
            layers: layers.to_vec(),
            values: vec![vec![share; layers.len()]; type_names.len()],
        }
    }

    /// Hand-given proportions, `layer -> [share per type]`
    ///
    /// # Errors
    /// Layers other than the requested ones, vectors not matching the type
    /// list, or a column that sums to neither 0 nor 1.
    pub fn manual(
        transmitter: Transmitter,
        type_names: &[String],
        layers: &[String],
        by_layer: &BTreeMap<String, Vec<f64>>,
    ) -> BuildResult<Self> {
        let mismatch = |detail: String| ConfigurationError::ProportionLayersMismatch {
            class: transmitter.to_string(),
            detail,
        };
        let mut missing: Vec<&str> = layers
            .iter()
            .filter(|l| !by_layer.contains_key(*l))
            .map(String::as_str)
            .collect();
        missing.extend(
            by_layer
                .keys()
                .filter(|l| !layers.contains(*l))
                .map(String::as_str),
        );
        if !missing.is_empty() {
            return Err(mismatch(format!("layers not matching: {}", missing.join(", "))).into());
        }

        let mut values = vec![vec![0.0; layers.len()]; type_names.len()];
        for (column, layer) in layers.iter().enumerate() {
            let shares = &by_layer[layer];
            if shares.len() != type_names.len() {
                return Err(BuildError::data_shape(format!(
                    "{} proportions for {} have {} values for {} types",
                    transmitter,
                    layer,
                    shares.len(),
                    type_names.len()
                )));
            }
            for (row, share) in shares.iter().enumerate() {
                values[row][column] = *share;
            }
        }

        let proportions = Self {
            transmitter,
            types: Self::cell_types(type_names, transmitter),
            layers: layers.to_vec(),
            values,
        };
        proportions.check_columns()?;
        Ok(proportions)
    }

    /// Census shares restricted to the requested types, re-normalized per layer
    ///
    /// # Errors
    /// A requested layer the census does not cover.
    pub fn from_census(
        transmitter: Transmitter,
        type_names: &[String],
        layers: &[String],
        shares: &LayerTypeShares,
    ) -> BuildResult<Self> {
        let mut values = vec![vec![0.0; layers.len()]; type_names.len()];
        for (column, layer) in layers.iter().enumerate() {
            let layer_shares = shares.get(layer).ok_or_else(|| {
                BuildError::data_shape(format!(
                    "{} census has no layer '{}' (census layers: {})",
                    transmitter,
                    layer,
                    shares.keys().cloned().collect::<Vec<_>>().join(", ")
                ))
            })?;

            let dropped: Vec<&String> = layer_shares
                .keys()
                .filter(|t| !type_names.contains(*t))
                .collect();
            if !dropped.is_empty() {
                debug!(target: "cxbuild-development", "   {}: dropping unused census types {:?}", layer, dropped);
            }

            let kept: Vec<(String, f64)> = type_names
                .iter()
                .map(|t| (t.clone(), layer_shares.get(t).copied().unwrap_or(0.0)))
                .collect();
            for (row, (_, share)) in normalized(kept).into_iter().enumerate() {
                values[row][column] = share;
            }
        }

        Ok(Self {
            transmitter,
            types: Self::cell_types(type_names, transmitter),
            layers: layers.to_vec(),
            values,
        })
    }

    /// Build the proportions of one class from the configured source
    pub fn resolve(
        transmitter: Transmitter,
        type_names: &[String],
        layers: &[String],
        manual: &BTreeMap<String, Vec<f64>>,
        census: Option<&CellTypeCensus>,
    ) -> BuildResult<Self> {
        if !manual.is_empty() {
            info!(target: "cxbuild-development", "   {} proportions: given by hand", transmitter);
            return Self::manual(transmitter, type_names, layers, manual);
        }
        match census.and_then(|c| c.shares(transmitter)) {
            Some(shares) => {
                info!(target: "cxbuild-development", "   {} proportions: from census", transmitter);
                Self::from_census(transmitter, type_names, layers, &shares)
            }
            None => {
                if census.is_some() {
                    warn!(target: "cxbuild-development",
                        "   Census has no {} type data, using uniform proportions", transmitter);
                }
                Ok(Self::uniform(transmitter, type_names, layers))
            }
        }
    }

    fn cell_types(type_names: &[String], transmitter: Transmitter) -> Vec<CellType> {
        type_names
            .iter()
            .map(|name| CellType::new(name, transmitter))
            .collect()
    }

    fn check_columns(&self) -> BuildResult<()> {
        for layer in &self.layers {
            let sum = self.column_sum(layer);
            if sum.abs() > SUM_TOLERANCE && (sum - 1.0).abs() > SUM_TOLERANCE {
                return Err(BuildError::data_shape(format!(
                    "{} proportions for layer {} sum to {}, expected 0 or 1",
                    self.transmitter, layer, sum
                )));
            }
        }
        Ok(())
    }

    pub fn transmitter(&self) -> Transmitter {
        self.transmitter
    }

    pub fn types(&self) -> &[CellType] {
        &self.types
    }

    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    pub fn cell_type(&self, name: &str) -> Option<&CellType> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Share of `type_name` in `layer`; 0 for unknown types or layers
    pub fn get(&self, type_name: &str, layer: &str) -> f64 {
        let row = self.types.iter().position(|t| t.name == type_name);
        let column = self.layers.iter().position(|l| l == layer);
        match (row, column) {
            (Some(r), Some(c)) => self.values[r][c],
            _ => 0.0,
        }
    }

    /// Types with a non-zero share in `layer`, in table order
    pub fn present_in<'a>(&'a self, layer: &'a str) -> impl Iterator<Item = (&'a CellType, f64)> + 'a {
        self.types
            .iter()
            .map(move |t| (t, self.get(&t.name, layer)))
            .filter(|(_, share)| *share != 0.0)
    }

    pub fn column_sum(&self, layer: &str) -> f64 {
        self.types.iter().map(|t| self.get(&t.name, layer)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxbuild_tables::MarkramLayerStats;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_class_resolved_once_from_name() {
        assert_eq!(CellClass::resolve("PC"), CellClass::Pyramidal);
        assert_eq!(CellClass::resolve("PC2"), CellClass::Pyramidal);
        assert_eq!(CellClass::resolve("HH_E"), CellClass::HodgkinHuxleyExcitatory);
        assert_eq!(CellClass::resolve("SST"), CellClass::Other("SST".to_string()));
        assert_eq!(CellClass::resolve("SS2"), CellClass::SpinyStellate);

        let sst = CellType::new("SST", Transmitter::Inhibitory);
        assert_eq!(sst.class, CellClass::Other("SST".to_string()));
        assert_eq!(sst.neuron_type(), "SST");
        assert_eq!(sst.contact_class(), "SST");
        let bc1 = CellType::new("BC1", Transmitter::Inhibitory);
        assert_eq!(bc1.neuron_type(), "BC1");

        let pc2 = CellType::new("PC2", Transmitter::Excitatory);
        assert_eq!(pc2.neuron_type(), "PC");
        assert_eq!(pc2.contact_class(), "PC");
        let ss = CellType::new("SS", Transmitter::Excitatory);
        assert_eq!(ss.contact_class(), "SS");
        assert!(!ss.is_pyramidal());
    }

    #[test]
    fn test_data_source_selector() {
        assert_eq!("".parse::<CellTypeDataSource>().unwrap(), CellTypeDataSource::Uniform);
        assert_eq!("HBP".parse::<CellTypeDataSource>().unwrap(), CellTypeDataSource::Markram);
        assert!(matches!(
            "Blue".parse::<CellTypeDataSource>(),
            Err(BuildError::Configuration(ConfigurationError::UnknownDataSource(_)))
        ));
    }

    #[test]
    fn test_uniform_columns_sum_to_one() {
        let p = CellTypeProportions::uniform(
            Transmitter::Inhibitory,
            &names(&["MC", "BC", "L1i"]),
            &names(&["L1", "L23"]),
        );
        assert!((p.column_sum("L23") - 1.0).abs() < 1e-12);
        assert_eq!(p.present_in("L1").count(), 3);
    }

    #[test]
    fn test_manual_proportions_validate_layers_and_sums() {
        let layers = names(&["L1", "L23"]);
        let types = names(&["MC", "BC"]);

        let mut by_layer = BTreeMap::new();
        by_layer.insert("L1".to_string(), vec![1.0, 0.0]);
        by_layer.insert("L23".to_string(), vec![0.5, 0.5]);
        let p = CellTypeProportions::manual(Transmitter::Inhibitory, &types, &layers, &by_layer).unwrap();
        assert_eq!(p.present_in("L1").map(|(t, _)| t.name.as_str()).collect::<Vec<_>>(), vec!["MC"]);

        let mut missing = by_layer.clone();
        missing.remove("L23");
        assert!(matches!(
            CellTypeProportions::manual(Transmitter::Inhibitory, &types, &layers, &missing),
            Err(BuildError::Configuration(ConfigurationError::ProportionLayersMismatch { .. }))
        ));

        let mut bad_sum = by_layer;
        bad_sum.insert("L23".to_string(), vec![0.5, 0.2]);
        assert!(matches!(
            CellTypeProportions::manual(Transmitter::Inhibitory, &types, &layers, &bad_sum),
            Err(BuildError::DataShape(_))
        ));
    }

    #[test]
    fn test_markram_census_renormalizes_requested_types() {
        let mut census = MarkramCensus::new();
        let mut stats = MarkramLayerStats::default();
        stats.neurons_per_mtype.insert("L23_MC".to_string(), 10.0);
        stats.neurons_per_mtype.insert("L23_NBC".to_string(), 20.0);
        stats.neurons_per_mtype.insert("L23_LBC".to_string(), 10.0);
        stats.neurons_per_mtype.insert("L23_BP".to_string(), 60.0);
        census.insert("L23".to_string(), stats);
        census.insert("L1".to_string(), MarkramLayerStats::default());
        let census = CellTypeCensus::Markram(census);

        assert!(census.shares(Transmitter::Excitatory).is_none());
        let shares = census.shares(Transmitter::Inhibitory).unwrap();
        assert!((shares["L23"]["VIP"] - 0.6).abs() < 1e-12);

        let p = CellTypeProportions::from_census(
            Transmitter::Inhibitory,
            &names(&["SST", "PVALB"]),
            &names(&["L1", "L23"]),
            &shares,
        )
        .unwrap();
        assert!((p.get("SST", "L23") - 0.25).abs() < 1e-12);
        assert!((p.get("PVALB", "L23") - 0.75).abs() < 1e-12);
        assert_eq!(p.column_sum("L1"), 0.0);

        let err = CellTypeProportions::from_census(
            Transmitter::Inhibitory,
            &names(&["SST"]),
            &names(&["L4"]),
            &shares,
        );
        assert!(matches!(err, Err(BuildError::DataShape(_))));
    }

    #[test]
    fn test_allen_counts_per_layer_and_class() {
        let row = |region: &str, class: &str, subclass: &str, layer: &str| AllenAnnotationRecord {
            region_label: region.to_string(),
            class_label: class.to_string(),
            subclass_label: subclass.to_string(),
            cortical_layer_label: layer.to_string(),
        };
        let census = CellTypeCensus::Allen(vec![
            row("V1C", "GABAergic", "SST", "L23"),
            row("V1C", "GABAergic", "PVALB", "L23"),
            row("V1C", "GABAergic", "PVALB", "L23"),
            row("V1C", "GABAergic", "PVALB", "L23"),
            row("V1C", "Glutamatergic", "IT", "L23"),
            row("V1C", "Glutamatergic", "IT", "L1"),
            row("MTG", "GABAergic", "VIP", "L23"),
        ]);
        let shares = census.shares(Transmitter::Inhibitory).unwrap();
        assert!((shares["L23"]["PVALB"] - 0.75).abs() < 1e-12);
        assert!(!shares["L23"].contains_key("VIP"));
        assert!(shares["L1"].is_empty());
    }
}
