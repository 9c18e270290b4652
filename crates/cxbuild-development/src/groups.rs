// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Neuron group synthesis.

Groups are emitted layer by layer in request order; within a layer the
excitatory types come first, then the inhibitory ones, each in the order of
their proportion table. A type with a zero share in a layer gets no group.
*/

use crate::cell_types::{CellClass, CellType, CellTypeProportions, Transmitter};
use crate::compartments::{ApicalDendriteMap, ApicalExtent};
use crate::layers::LayerOntology;
use crate::population::PopulationModel;
use crate::types::{BuildError, BuildResult, ConfigurationError, GroupIdx, LayerIdx};
use cxbuild_config::BackgroundConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Layer index of the external input pseudo-layer
pub const INPUT_LAYER_IDX: LayerIdx = 0;
/// Group index of the external input pseudo-group
pub const INPUT_GROUP_IDX: GroupIdx = 0;

/// `layer_idx` column: a plain layer, or a pyramidal apical extent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerPlacement {
    Layer(LayerIdx),
    Extent(ApicalExtent),
}

impl LayerPlacement {
    /// Layer holding the soma
    pub fn home_layer(&self) -> LayerIdx {
        match self {
            LayerPlacement::Layer(idx) => *idx,
            LayerPlacement::Extent(extent) => extent.source,
        }
    }

    pub fn extent(&self) -> Option<&ApicalExtent> {
        match self {
            LayerPlacement::Layer(_) => None,
            LayerPlacement::Extent(extent) => Some(extent),
        }
    }
}

impl fmt::Display for LayerPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerPlacement::Layer(idx) => write!(f, "{}", idx),
            LayerPlacement::Extent(extent) => write!(f, "{}", extent),
        }
    }
}

impl FromStr for LayerPlacement {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('[') {
            return Ok(LayerPlacement::Extent(s.parse()?));
        }
        s.parse::<LayerIdx>()
            .map(LayerPlacement::Layer)
            .map_err(|_| BuildError::data_shape(format!("'{}' is not a layer index or extent", s)))
    }
}

/// Background Poisson input counts of one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackgroundInputs {
    pub n_background_inputs: u32,
    pub n_background_inhibition: u32,
}

impl BackgroundInputs {
    pub fn for_transmitter(config: &BackgroundConfig, transmitter: Transmitter) -> Self {
        match transmitter {
            Transmitter::Excitatory => Self {
                n_background_inputs: config.excitatory_inputs,
                n_background_inhibition: config.excitatory_inhibition,
            },
            Transmitter::Inhibitory => Self {
                n_background_inputs: config.inhibitory_inputs,
                n_background_inhibition: config.inhibitory_inhibition,
            },
        }
    }
}

/// One neuron group row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronGroup {
    pub idx: GroupIdx,
    pub cell_type: CellType,
    /// `<layer>_<type>`, unique within a build
    pub neuron_subtype: String,
    pub number_of_neurons: u64,
    pub placement: LayerPlacement,
    pub background: BackgroundInputs,
}

impl NeuronGroup {
    pub fn subtype_name(layer: &str, type_name: &str) -> String {
        format!("{}_{}", layer, type_name)
    }

    pub fn neuron_type(&self) -> &str {
        self.cell_type.neuron_type()
    }

    pub fn is_pyramidal(&self) -> bool {
        self.cell_type.is_pyramidal()
    }

    /// Input pseudo-group; never exported as a group row
    pub fn input(cell_type: CellType) -> Self {
        Self {
            idx: INPUT_GROUP_IDX,
            neuron_subtype: format!("IN_{}", cell_type.name),
            cell_type,
            number_of_neurons: 0,
            placement: LayerPlacement::Layer(INPUT_LAYER_IDX),
            background: BackgroundInputs::default(),
        }
    }
}

/// Every group known to one build
///
/// `groups` holds the exported rows in idx order: pre-existing groups kept in
/// append mode, then the synthesized ones. The input pseudo-group, when
/// present, is kept apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupTable {
    input: Option<NeuronGroup>,
    groups: Vec<NeuronGroup>,
}

impl GroupTable {
    /// # Errors
    /// Duplicate subtypes, or idx values that are not contiguous from the
    /// first group.
    pub fn new(input: Option<NeuronGroup>, groups: Vec<NeuronGroup>) -> BuildResult<Self> {
        {
            let mut seen = HashSet::new();
            for group in input.iter().chain(&groups) {
                if !seen.insert(group.neuron_subtype.as_str()) {
                    return Err(ConfigurationError::DuplicateSubtype(group.neuron_subtype.clone()).into());
                }
            }
        }
        if let Some(first) = groups.first() {
            for (offset, group) in groups.iter().enumerate() {
                if group.idx != first.idx + offset {
                    return Err(BuildError::data_shape(format!(
                        "group idx {} of {} breaks the contiguous range starting at {}",
                        group.idx, group.neuron_subtype, first.idx
                    )));
                }
            }
        }
        Ok(Self { input, groups })
    }

    pub fn input(&self) -> Option<&NeuronGroup> {
        self.input.as_ref()
    }

    /// Exported groups in idx order
    pub fn groups(&self) -> &[NeuronGroup] {
        &self.groups
    }

    /// Input pseudo-group first, then the exported groups
    pub fn all(&self) -> impl Iterator<Item = &NeuronGroup> {
        self.input.iter().chain(self.groups.iter())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, idx: GroupIdx) -> Option<&NeuronGroup> {
        self.all().find(|g| g.idx == idx)
    }

    pub fn by_subtype(&self, subtype: &str) -> Option<&NeuronGroup> {
        self.all().find(|g| g.neuron_subtype == subtype)
    }

    /// Pyramidal groups whose dendritic tree reaches `layer`, in idx order
    pub fn pyramidal_spanning(&self, layer: LayerIdx) -> impl Iterator<Item = (&NeuronGroup, &ApicalExtent)> {
        self.groups.iter().filter_map(move |g| {
            g.placement
                .extent()
                .filter(|extent| g.is_pyramidal() && extent.spans(layer))
                .map(|extent| (g, extent))
        })
    }

    pub fn total_neurons(&self) -> u64 {
        self.groups.iter().map(|g| g.number_of_neurons).sum()
    }

    /// idx the next appended group would receive
    pub fn next_idx(&self) -> GroupIdx {
        self.groups.last().map(|g| g.idx + 1).unwrap_or(1)
    }
}

/// Rebuild a group from its exported column values
pub fn group_from_columns(
    idx: GroupIdx,
    neuron_type: &str,
    neuron_subtype: &str,
    number_of_neurons: u64,
    placement: LayerPlacement,
    background: BackgroundInputs,
) -> NeuronGroup {
    let type_name = neuron_subtype
        .split_once('_')
        .map(|(_, t)| t)
        .unwrap_or(neuron_type);
    let class = CellClass::resolve(neuron_type);
    NeuronGroup {
        idx,
        cell_type: CellType {
            name: type_name.to_string(),
            transmitter: class.default_transmitter(),
            class,
        },
        neuron_subtype: neuron_subtype.to_string(),
        number_of_neurons,
        placement,
        background,
    }
}

/// Emits neuron groups from populations and cell type proportions
pub struct GroupSynthesizer<'a> {
    ontology: &'a LayerOntology,
    population: &'a PopulationModel,
    excitatory: &'a CellTypeProportions,
    inhibitory: &'a CellTypeProportions,
    apical: &'a ApicalDendriteMap,
    background: &'a BackgroundConfig,
}

impl<'a> GroupSynthesizer<'a> {
    pub fn new(
        ontology: &'a LayerOntology,
        population: &'a PopulationModel,
        excitatory: &'a CellTypeProportions,
        inhibitory: &'a CellTypeProportions,
        apical: &'a ApicalDendriteMap,
        background: &'a BackgroundConfig,
    ) -> Self {
        Self {
            ontology,
            population,
            excitatory,
            inhibitory,
            apical,
            background,
        }
    }

    /// Groups for every requested layer, numbered from `start_idx`
    ///
    /// # Errors
    /// A pyramidal type whose home layer or type is missing from the apical
    /// dendrite table.
    pub fn synthesize(&self, start_idx: GroupIdx) -> BuildResult<Vec<NeuronGroup>> {
        info!(target: "cxbuild-development", "🧬 Synthesizing neuron groups from idx {}", start_idx);
        let area_proportion = self.population.area_proportion;
        let mut groups = Vec::new();

        for layer in self.ontology.layers() {
            let population = self.population.layer(&layer.name).ok_or_else(|| {
                BuildError::data_shape(format!("no population computed for layer {}", layer.name))
            })?;

            let pools = [
                (self.excitatory, population.excitatory_pool(area_proportion)),
                (self.inhibitory, population.inhibitory_pool(area_proportion)),
            ];
            for (proportions, pool) in pools {
                for (cell_type, share) in proportions.present_in(&layer.name) {
                    let placement = if cell_type.is_pyramidal() {
                        LayerPlacement::Extent(self.apical.extent_for(
                            &layer.name,
                            &cell_type.name,
                            self.ontology,
                        )?)
                    } else {
                        LayerPlacement::Layer(layer.idx)
                    };

                    let group = NeuronGroup {
                        idx: start_idx + groups.len(),
                        cell_type: cell_type.clone(),
                        neuron_subtype: NeuronGroup::subtype_name(&layer.name, &cell_type.name),
                        number_of_neurons: (share * pool).round_ties_even().max(0.0) as u64,
                        placement,
                        background: BackgroundInputs::for_transmitter(self.background, cell_type.transmitter),
                    };
                    debug!(target: "cxbuild-development",
                        "   [{}] {} n={} layer_idx={}",
                        group.idx, group.neuron_subtype, group.number_of_neurons, group.placement);
                    groups.push(group);
                }
            }
        }

        info!(target: "cxbuild-development",
            "  ✅ {} neuron groups, {} neurons",
            groups.len(), groups.iter().map(|g| g.number_of_neurons).sum::<u64>());
        Ok(groups)
    }
}
