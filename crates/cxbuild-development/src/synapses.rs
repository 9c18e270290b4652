// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Synapse resolution: layer-pair probabilities to group-level synapse rows.

For every layer connection and every cell type present in its source layer,
the postsynaptic candidates in the target layer are, in order:

1. excitatory non-pyramidal types present in the target layer,
2. pyramidal groups whose dendritic tree reaches the target layer,
3. inhibitory types present in the target layer.

A candidate is kept when the contact permission table lets the source class
reach it. Pyramidal targets are addressed by compartment
(`idx[C]offset letters`) and weighted by the compartment targeting rules.
The final probability is `p_layer × type_weight × compartment_weight`.
*/

use crate::cell_types::{CellType, CellTypeProportions};
use crate::compartments::CompartmentCategory;
use crate::connections::LayerConnection;
use crate::groups::{GroupTable, NeuronGroup};
use crate::layers::LayerOntology;
use crate::types::{BuildError, BuildResult, ConfigurationError, GroupIdx};
use cxbuild_config::ConnectionsConfig;
use cxbuild_tables::{format_float, CompartmentRuleRecord, ContactPermissionRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Conductance a synapse row drives; excitatory sorts first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Receptor {
    Ge,
    Gi,
}

impl fmt::Display for Receptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Receptor::Ge => write!(f, "ge"),
            Receptor::Gi => write!(f, "gi"),
        }
    }
}

impl FromStr for Receptor {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ge" => Ok(Receptor::Ge),
            "gi" => Ok(Receptor::Gi),
            other => Err(BuildError::data_shape(format!("unknown receptor '{}'", other))),
        }
    }
}

/// Sites contacted at the soma layer of a pyramidal cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SomaSites {
    pub basal: bool,
    pub soma: bool,
    pub apical: bool,
}

impl SomaSites {
    pub fn count(&self) -> usize {
        [self.basal, self.soma, self.apical].iter().filter(|s| **s).count()
    }
}

impl fmt::Display for SomaSites {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (on, letter) in [(self.basal, 'b'), (self.soma, 's'), (self.apical, 'a')] {
            if on {
                write!(f, "{}", letter)?;
            }
        }
        Ok(())
    }
}

/// `post_syn_idx` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostTarget {
    /// Point neuron group
    Group(GroupIdx),
    /// Pyramidal compartment `offset` layers above the soma; `sites` is set
    /// only at the soma layer
    Compartment {
        idx: GroupIdx,
        offset: usize,
        sites: Option<SomaSites>,
    },
}

impl PostTarget {
    pub fn group_idx(&self) -> GroupIdx {
        match self {
            PostTarget::Group(idx) => *idx,
            PostTarget::Compartment { idx, .. } => *idx,
        }
    }
}

impl fmt::Display for PostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostTarget::Group(idx) => write!(f, "{}", idx),
            PostTarget::Compartment { idx, offset, sites } => {
                write!(f, "{}[C]{}", idx, offset)?;
                if let Some(sites) = sites {
                    write!(f, "{}", sites)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for PostTarget {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || BuildError::data_shape(format!("'{}' is not a postsynaptic target", s));
        let Some((idx, rest)) = s.split_once("[C]") else {
            return s.parse().map(PostTarget::Group).map_err(|_| bad());
        };

        let idx = idx.parse().map_err(|_| bad())?;
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let offset = rest[..digits].parse().map_err(|_| bad())?;
        let letters = &rest[digits..];
        let sites = if letters.is_empty() {
            None
        } else {
            let mut sites = SomaSites::default();
            for letter in letters.chars() {
                match letter {
                    'b' => sites.basal = true,
                    's' => sites.soma = true,
                    'a' => sites.apical = true,
                    _ => return Err(bad()),
                }
            }
            Some(sites)
        };
        Ok(PostTarget::Compartment { idx, offset, sites })
    }
}

/// One synapse row; `p` and `n` hold one entry per contacted site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synapse {
    pub receptor: Receptor,
    pub pre_syn_idx: GroupIdx,
    pub post: PostTarget,
    pub p: Vec<f64>,
    pub n: Vec<u32>,
}

impl Synapse {
    /// `0.15` or `0.0135+0.0045`
    pub fn p_literal(&self) -> String {
        self.p.iter().map(|p| format_float(*p)).collect::<Vec<_>>().join("+")
    }

    /// `1` or `1+1`
    pub fn n_literal(&self) -> String {
        self.n.iter().map(u32::to_string).collect::<Vec<_>>().join("+")
    }
}

/// Resolved synapse rows, sorted by (pre_syn_idx, receptor)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynapseTable {
    synapses: Vec<Synapse>,
}

impl SynapseTable {
    /// Stable-sorts `synapses` by (pre_syn_idx, receptor)
    pub fn new(mut synapses: Vec<Synapse>) -> Self {
        synapses.sort_by_key(|s| (s.pre_syn_idx, s.receptor));
        Self { synapses }
    }

    pub fn synapses(&self) -> &[Synapse] {
        &self.synapses
    }

    pub fn len(&self) -> usize {
        self.synapses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synapses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Synapse> {
        self.synapses.iter()
    }

    /// Every pre and post idx must name a group of `groups`
    pub fn check_references(&self, groups: &GroupTable) -> BuildResult<()> {
        for synapse in &self.synapses {
            for idx in [synapse.pre_syn_idx, synapse.post.group_idx()] {
                if groups.get(idx).is_none() {
                    return Err(BuildError::data_shape(format!(
                        "synapse {} -> {} references unknown group {}",
                        synapse.pre_syn_idx, synapse.post, idx
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Contact permissions per presynaptic class; the first row of a class wins
#[derive(Debug, Clone, Default)]
pub struct ContactPermissions {
    rules: HashMap<String, Vec<(String, f64)>>,
}

impl ContactPermissions {
    pub fn from_records(records: &[ContactPermissionRecord]) -> BuildResult<Self> {
        let mut rules = HashMap::new();
        for record in records {
            let key = record.presynaptic.trim().to_string();
            if rules.contains_key(&key) {
                continue;
            }
            rules.insert(key, record.permitted()?);
        }
        Ok(Self { rules })
    }

    /// Weight of `pre` contacting `post`, or `None` when not permitted
    pub fn weight(&self, pre: &str, post: &str) -> Option<f64> {
        self.rules
            .get(pre)?
            .iter()
            .find(|(class, _)| class == post)
            .map(|(_, weight)| *weight)
    }
}

/// Compartment targeting distribution per presynaptic class:
/// basal, soma, apical at soma layer, apical proximal, apical distal
#[derive(Debug, Clone, Default)]
pub struct CompartmentRules {
    rules: HashMap<String, [f64; 5]>,
}

impl CompartmentRules {
    pub fn from_records(records: &[CompartmentRuleRecord]) -> BuildResult<Self> {
        let mut rules = HashMap::new();
        for record in records {
            rules
                .entry(record.presynaptic.trim().to_string())
                .or_insert(record.weights()?);
        }
        Ok(Self { rules })
    }

    pub fn get(&self, pre: &str) -> Option<&[f64; 5]> {
        self.rules.get(pre)
    }

    /// Contacted sites and their weights; `None` when every weight is zero
    fn targeting(distribution: &[f64; 5], category: CompartmentCategory) -> Option<(Option<SomaSites>, Vec<f64>)> {
        match category {
            CompartmentCategory::Soma => {
                let sites = SomaSites {
                    basal: distribution[0] > 0.0,
                    soma: distribution[1] > 0.0,
                    apical: distribution[2] > 0.0,
                };
                let weights: Vec<f64> = distribution[..3].iter().copied().filter(|w| *w > 0.0).collect();
                (!weights.is_empty()).then_some((Some(sites), weights))
            }
            CompartmentCategory::ApicalProximal => {
                (distribution[3] != 0.0).then(|| (None, vec![distribution[3]]))
            }
            CompartmentCategory::ApicalDistal => {
                (distribution[4] != 0.0).then(|| (None, vec![distribution[4]]))
            }
        }
    }
}

/// Capacity and per-row constants of a resolution pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynapseSettings {
    pub max_rows: usize,
    pub synapses_per_connection: u32,
}

impl SynapseSettings {
    pub fn from_config(config: &ConnectionsConfig) -> Self {
        Self {
            max_rows: config.max_synapse_rows,
            synapses_per_connection: config.synapses_per_connection,
        }
    }
}

impl Default for SynapseSettings {
    fn default() -> Self {
        Self {
            max_rows: 1000,
            synapses_per_connection: 1,
        }
    }
}

enum Candidate<'g> {
    Point(&'g NeuronGroup),
    /// Group, compartment offset above the soma, compartment category
    Pyramidal(&'g NeuronGroup, usize, CompartmentCategory),
}

impl Candidate<'_> {
    fn group(&self) -> &NeuronGroup {
        match self {
            Candidate::Point(group) | Candidate::Pyramidal(group, _, _) => *group,
        }
    }
}

/// Turns layer connections into synapse rows
pub struct SynapseResolver<'a> {
    ontology: &'a LayerOntology,
    excitatory: &'a CellTypeProportions,
    inhibitory: &'a CellTypeProportions,
    permissions: &'a ContactPermissions,
    compartments: &'a CompartmentRules,
    settings: SynapseSettings,
}

impl<'a> SynapseResolver<'a> {
    pub fn new(
        ontology: &'a LayerOntology,
        excitatory: &'a CellTypeProportions,
        inhibitory: &'a CellTypeProportions,
        permissions: &'a ContactPermissions,
        compartments: &'a CompartmentRules,
        settings: SynapseSettings,
    ) -> Self {
        Self {
            ontology,
            excitatory,
            inhibitory,
            permissions,
            compartments,
            settings,
        }
    }

    /// Resolve the input block (when `input` is given), then the excitatory
    /// and the inhibitory connections
    ///
    /// `input` is a connection from [`crate::groups::INPUT_LAYER_IDX`]; its presynaptic
    /// group is the input pseudo-group of `groups`.
    ///
    /// # Errors
    /// More rows than the configured capacity, a source or target group
    /// missing from `groups`, or a pyramidal target contacted by a class
    /// without compartment rules.
    pub fn resolve(
        &self,
        groups: &GroupTable,
        excitatory: &[LayerConnection],
        inhibitory: &[LayerConnection],
        input: Option<&LayerConnection>,
    ) -> BuildResult<SynapseTable> {
        info!(target: "cxbuild-development",
            "🔗 Resolving synapses: {} excitatory, {} inhibitory layer pairs{}",
            excitatory.len(), inhibitory.len(),
            if input.is_some() { ", plus input" } else { "" });

        let mut synapses = Vec::new();

        if let Some(connection) = input {
            let input_group = groups.input().ok_or_else(|| {
                BuildError::data_shape("input connection requested but the build has no input group")
            })?;
            self.resolve_connection(groups, Receptor::Ge, connection, &[input_group], &mut synapses)?;
        }

        for (receptor, connections, proportions) in [
            (Receptor::Ge, excitatory, self.excitatory),
            (Receptor::Gi, inhibitory, self.inhibitory),
        ] {
            for connection in connections {
                let pre_layer = self.layer_name(connection.source)?;
                let pre_groups = proportions
                    .present_in(pre_layer)
                    .map(|(cell_type, _)| self.group_of(groups, pre_layer, cell_type))
                    .collect::<BuildResult<Vec<_>>>()?;
                self.resolve_connection(groups, receptor, connection, &pre_groups, &mut synapses)?;
            }
        }

        if synapses.len() > self.settings.max_rows {
            return Err(ConfigurationError::SynapseCapacityExceeded {
                needed: synapses.len(),
                capacity: self.settings.max_rows,
            }
            .into());
        }

        info!(target: "cxbuild-development", "  ✅ {} synapse rows", synapses.len());
        Ok(SynapseTable::new(synapses))
    }

    fn resolve_connection(
        &self,
        groups: &GroupTable,
        receptor: Receptor,
        connection: &LayerConnection,
        pre_groups: &[&NeuronGroup],
        out: &mut Vec<Synapse>,
    ) -> BuildResult<()> {
        let candidates = self.candidates(groups, connection.target)?;

        for pre in pre_groups {
            let pre_class = pre.cell_type.contact_class();
            for candidate in &candidates {
                let post_group = candidate.group();
                let Some(type_weight) = self.permissions.weight(pre_class, post_group.cell_type.contact_class()) else {
                    debug!(target: "cxbuild-development",
                        "   {} may not contact {}", pre.neuron_subtype, post_group.neuron_subtype);
                    continue;
                };
                let p = connection.p * type_weight;

                let (post, p) = match candidate {
                    Candidate::Point(group) => (PostTarget::Group(group.idx), vec![p]),
                    Candidate::Pyramidal(group, offset, category) => {
                        let distribution = self
                            .compartments
                            .get(pre_class)
                            .ok_or_else(|| ConfigurationError::MissingCompartmentRule(pre_class.to_string()))?;
                        let Some((sites, weights)) = CompartmentRules::targeting(distribution, *category) else {
                            continue;
                        };
                        (
                            PostTarget::Compartment {
                                idx: group.idx,
                                offset: *offset,
                                sites,
                            },
                            weights.into_iter().map(|w| p * w).collect(),
                        )
                    }
                };

                out.push(Synapse {
                    receptor,
                    pre_syn_idx: pre.idx,
                    post,
                    n: vec![self.settings.synapses_per_connection; p.len()],
                    p,
                });
            }
        }
        Ok(())
    }

    fn candidates<'g>(&self, groups: &'g GroupTable, target: usize) -> BuildResult<Vec<Candidate<'g>>> {
        let post_layer = self.layer_name(target)?;
        let mut candidates = Vec::new();

        for (cell_type, _) in self.excitatory.present_in(post_layer) {
            if !cell_type.is_pyramidal() {
                let group = self.group_of(groups, post_layer, cell_type)?;
                candidates.push(Candidate::Point(group));
            }
        }
        for (group, extent) in groups.pyramidal_spanning(target) {
            if let Some(category) = extent.compartment_at(target) {
                candidates.push(Candidate::Pyramidal(group, extent.offset_of(target), category));
            }
        }
        for (cell_type, _) in self.inhibitory.present_in(post_layer) {
            let group = self.group_of(groups, post_layer, cell_type)?;
            candidates.push(Candidate::Point(group));
        }
        Ok(candidates)
    }

    fn group_of<'g>(&self, groups: &'g GroupTable, layer: &str, cell_type: &CellType) -> BuildResult<&'g NeuronGroup> {
        let subtype = NeuronGroup::subtype_name(layer, &cell_type.name);
        groups
            .by_subtype(&subtype)
            .ok_or_else(|| BuildError::data_shape(format!("no neuron group {} in the group table", subtype)))
    }

    fn layer_name(&self, idx: usize) -> BuildResult<&'a str> {
        self.ontology
            .name_of(idx)
            .ok_or_else(|| BuildError::data_shape(format!("layer idx {} is not requested", idx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_target_literals() {
        assert_eq!(PostTarget::Group(7).to_string(), "7");
        let soma = PostTarget::Compartment {
            idx: 3,
            offset: 0,
            sites: Some(SomaSites {
                basal: true,
                soma: false,
                apical: true,
            }),
        };
        assert_eq!(soma.to_string(), "3[C]0ba");
        let distal = PostTarget::Compartment {
            idx: 12,
            offset: 4,
            sites: None,
        };
        assert_eq!(distal.to_string(), "12[C]4");
        assert_eq!("3[C]0ba".parse::<PostTarget>().unwrap(), soma);
        assert_eq!("12[C]4".parse::<PostTarget>().unwrap(), distal);
        assert!("3[C]0x".parse::<PostTarget>().is_err());
    }

    #[test]
    fn test_receptor_order() {
        assert!(Receptor::Ge < Receptor::Gi);
        assert_eq!("gi".parse::<Receptor>().unwrap(), Receptor::Gi);
    }

    #[test]
    fn test_multi_site_literals() {
        let synapse = Synapse {
            receptor: Receptor::Ge,
            pre_syn_idx: 1,
            post: PostTarget::Group(2),
            p: vec![0.25, 0.5],
            n: vec![1, 1],
        };
        assert_eq!(synapse.p_literal(), "0.25+0.5");
        assert_eq!(synapse.n_literal(), "1+1");
    }

    #[test]
    fn test_soma_targeting_skips_zero_sites() {
        let (sites, weights) =
            CompartmentRules::targeting(&[0.6, 0.0, 0.2, 0.1, 0.1], CompartmentCategory::Soma).unwrap();
        assert_eq!(sites.unwrap().to_string(), "ba");
        assert_eq!(weights, vec![0.6, 0.2]);
        assert!(CompartmentRules::targeting(&[0.0, 0.0, 0.0, 0.5, 0.0], CompartmentCategory::Soma).is_none());
        assert!(CompartmentRules::targeting(&[1.0, 0.0, 0.0, 0.0, 0.0], CompartmentCategory::ApicalDistal).is_none());
    }

    #[test]
    fn test_first_permission_row_wins() {
        let record = |pre: &str, post: &str, weights: &str| ContactPermissionRecord {
            presynaptic: pre.to_string(),
            postsynaptic: post.to_string(),
            weights: weights.to_string(),
        };
        let permissions = ContactPermissions::from_records(&[
            record("SS", "PC, BC", "1, 0.5"),
            record("SS", "MC", "1"),
        ])
        .unwrap();
        assert_eq!(permissions.weight("SS", "BC"), Some(0.5));
        assert_eq!(permissions.weight("SS", "MC"), None);
        assert_eq!(permissions.weight("BC", "PC"), None);
    }
}
