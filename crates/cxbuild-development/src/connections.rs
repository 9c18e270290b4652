// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Connection normalization: qualitative survey strengths to layer-pair
connection probabilities.

Each survey row contributes `p_partial = (strength / 0.5) × apc × FL × TL`
with baseline contact probability `apc = 0.1` and FL/TL the sub-proportions
of its source and target sublayers. Rows are then pooled per requested
layer pair and rescaled by the summed proportions:
`p = 2·Σp_partial / (ΣFL + ΣTL)`.
*/

use crate::layers::{LayerOntology, MappingScope};
use crate::types::{BuildError, BuildResult, LayerIdx};
use cxbuild_tables::ConnectionRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Probability that two neurons connect when the axon and the soma share a
/// layer
pub const BASELINE_CONTACT_PROBABILITY: f64 = 0.1;

/// Qualitative strength label of a survey row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strength {
    Dominant,
    Median,
    Sparse,
}

impl Strength {
    /// Mean fraction of axonal sprouting the label stands for
    pub fn weight(self) -> f64 {
        match self {
            Strength::Dominant => 0.75,
            Strength::Median => 0.30,
            Strength::Sparse => 0.05,
        }
    }
}

impl FromStr for Strength {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "D" => Ok(Strength::Dominant),
            "M" => Ok(Strength::Median),
            "S" => Ok(Strength::Sparse),
            other => Err(BuildError::data_shape(format!(
                "connection strength '{}' is not one of D, M, S",
                other
            ))),
        }
    }
}

/// Normalized connection probability between two requested layers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerConnection {
    pub source: LayerIdx,
    pub target: LayerIdx,
    pub p: f64,
}

#[derive(Default)]
struct PairSums {
    p_partial: f64,
    source_proportion: f64,
    target_proportion: f64,
}

/// Turns survey rows into [`LayerConnection`]s for one build
pub struct ConnectionNormalizer<'a> {
    ontology: &'a LayerOntology,
    scope: MappingScope,
}

impl<'a> ConnectionNormalizer<'a> {
    /// `use_all_csv_data` selects the full mapping over the groups mapping
    pub fn new(ontology: &'a LayerOntology, use_all_csv_data: bool) -> Self {
        Self {
            ontology,
            scope: if use_all_csv_data {
                MappingScope::Full
            } else {
                MappingScope::Groups
            },
        }
    }

    /// Layer pairs of `area`, ordered by (source, target)
    ///
    /// # Errors
    /// A kept row with an unknown strength label.
    pub fn normalize(&self, records: &[ConnectionRecord], area: &str) -> BuildResult<Vec<LayerConnection>> {
        let lookup = self.ontology.sublayer_lookup(self.scope);
        let requested = self.ontology.group_indices();

        let mut in_area = 0usize;
        let mut pairs: BTreeMap<(LayerIdx, LayerIdx), PairSums> = BTreeMap::new();
        for record in records.iter().filter(|r| r.from_area.trim() == area) {
            in_area += 1;
            let (Some(&(source, source_proportion)), Some(&(target, target_proportion))) = (
                lookup.get(record.from_layer.trim()),
                lookup.get(record.to_layer.trim()),
            ) else {
                debug!(target: "cxbuild-development",
                    "   Skipping {} -> {}: sublayer not requested", record.from_layer, record.to_layer);
                continue;
            };
            if !requested.contains(&source) || !requested.contains(&target) {
                continue;
            }

            let strength: Strength = record.strength.parse()?;
            let sums = pairs.entry((source, target)).or_default();
            sums.p_partial += (strength.weight() / 0.5)
                * BASELINE_CONTACT_PROBABILITY
                * source_proportion
                * target_proportion;
            sums.source_proportion += source_proportion;
            sums.target_proportion += target_proportion;
        }

        if in_area == 0 {
            warn!(target: "cxbuild-development", "⚠️  Connection table has no rows for area {}", area);
        }

        let connections: Vec<LayerConnection> = pairs
            .into_iter()
            .map(|((source, target), sums)| {
                let scale = sums.source_proportion + sums.target_proportion;
                LayerConnection {
                    source,
                    target,
                    p: if scale > 0.0 {
                        sums.p_partial * 2.0 / scale
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        info!(target: "cxbuild-development",
            "   {} survey rows of {} -> {} layer pairs", in_area, area, connections.len());
        Ok(connections)
    }
}
