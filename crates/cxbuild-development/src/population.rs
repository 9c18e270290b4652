// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Per-layer neuron populations.

The simulated patch is a disc of cortex under a circular visual-field patch.
Its size follows the log-linear magnification model `M(E) = 1/(a + bE)` with
`k = (1 + E)·M(E)` and cortical distance `k·ln(1 + E ± r)`. The fraction of
the area it covers scales the census densities down to neuron counts.
*/

use crate::layers::{LayerOntology, LayerSpec, MappingScope};
use crate::types::{BuildError, BuildResult, ConfigurationError};
use cxbuild_config::AreaConfig;
use cxbuild_tables::{CensusRecord, KeyedTable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;
use tracing::{debug, info, warn};

/// Visual-field patch and magnification constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaGeometry {
    pub radius_deg: f64,
    pub eccentricity_deg: f64,
    pub magnification_a: f64,
    pub magnification_b: f64,
}

impl AreaGeometry {
    pub fn from_config(area: &AreaConfig) -> Self {
        Self {
            radius_deg: area.visual_field_radius_deg,
            eccentricity_deg: area.center_eccentricity_deg,
            magnification_a: area.magnification_a,
            magnification_b: area.magnification_b,
        }
    }

    /// Cortical area of the patch in mm²
    pub fn patch_area_mm2(&self) -> BuildResult<f64> {
        let e = self.eccentricity_deg;
        let r = self.radius_deg;
        if r <= 0.0 || 1.0 + e - r <= 0.0 {
            return Err(ConfigurationError::InvalidAreaGeometry(format!(
                "radius {} deg at eccentricity {} deg leaves ln(1 + E - r) undefined",
                r, e
            ))
            .into());
        }

        let magnification = 1.0 / (self.magnification_a + self.magnification_b * e);
        let k = (1.0 + e) * magnification;
        let cx_min = k * (1.0 + e - r).ln();
        let cx_max = k * (1.0 + e + r).ln();
        let radius_mm = (cx_max - cx_min) / 2.0;
        Ok(PI * radius_mm.powi(2))
    }
}

/// Fraction of the named area covered by the simulated patch
///
/// The total comes from `stats[stat_row][area]`. Areas without survey
/// statistics are simulated whole (proportion 1).
pub fn area_proportion(area: &AreaConfig, stats: &KeyedTable) -> BuildResult<f64> {
    let Some(total) = stats.get_f64(&area.area_stat_row, &area.name)? else {
        warn!(target: "cxbuild-development",
            "⚠️  No '{}' statistic for area {} in {}, using area proportion 1.0",
            area.area_stat_row, area.name, stats.name());
        return Ok(1.0);
    };
    if total <= 0.0 {
        return Err(BuildError::data_shape(format!(
            "total area of {} is {} in {}",
            area.name,
            total,
            stats.name()
        )));
    }

    let patch = AreaGeometry::from_config(area).patch_area_mm2()?;
    let proportion = patch / total;
    info!(target: "cxbuild-development",
        "   Patch area {:.4} mm² of {} mm² total {} (proportion {:.3e})",
        patch, total, area.name, proportion);
    Ok(proportion)
}

/// Neurons of one requested layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerPopulation {
    pub layer: LayerSpec,
    /// Neurons in the whole area layer (census density × 1e6)
    pub total_neurons: f64,
    pub proportion_inhibitory: f64,
}

impl LayerPopulation {
    pub fn excitatory_pool(&self, area_proportion: f64) -> f64 {
        (1.0 - self.proportion_inhibitory) * area_proportion * self.total_neurons
    }

    pub fn inhibitory_pool(&self, area_proportion: f64) -> f64 {
        self.proportion_inhibitory * area_proportion * self.total_neurons
    }
}

/// Area-scaled populations for every requested layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationModel {
    pub area_proportion: f64,
    layers: Vec<LayerPopulation>,
}

impl PopulationModel {
    /// # Errors
    /// A down-mapped census layer absent from the census, or a requested
    /// layer whose down-mapping carries no neurons.
    pub fn build(
        ontology: &LayerOntology,
        census: &[CensusRecord],
        area_proportion: f64,
    ) -> BuildResult<Self> {
        let by_layer: HashMap<&str, &CensusRecord> =
            census.iter().map(|r| (r.layer.trim(), r)).collect();

        let mut layers = Vec::with_capacity(ontology.layers().len());
        for spec in ontology.layers() {
            let mut density = 0.0;
            let mut inhibitory = 0.0;
            for mapping in ontology.mappings_for(&spec.name, MappingScope::Groups) {
                let record = by_layer.get(mapping.census_layer.as_str()).ok_or_else(|| {
                    BuildError::data_shape(format!(
                        "census has no layer '{}' (down-mapped from {} via {})",
                        mapping.census_layer, spec.name, mapping.csv_layer
                    ))
                })?;
                let weighted = mapping.sub_proportion * record.n_neurons_10e6;
                density += weighted;
                inhibitory += weighted * record.percent_inhibitory;
            }

            if density == 0.0 {
                return Err(ConfigurationError::EmptyDownMapping(spec.name.clone()).into());
            }

            let population = LayerPopulation {
                layer: spec.clone(),
                total_neurons: density * 1e6,
                proportion_inhibitory: inhibitory / density / 100.0,
            };
            debug!(target: "cxbuild-development",
                "   {}: {:.0} neurons in area, {:.1}% inhibitory",
                spec.name, population.total_neurons, population.proportion_inhibitory * 100.0);
            layers.push(population);
        }

        Ok(Self {
            area_proportion,
            layers,
        })
    }

    pub fn layers(&self) -> &[LayerPopulation] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&LayerPopulation> {
        self.layers.iter().find(|p| p.layer.name == name)
    }
}
