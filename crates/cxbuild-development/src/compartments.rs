// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Pyramidal cell apical dendrites and their compartments.

An extent `[5->3]` places the soma in layer 5 and runs the apical dendrite
up to layer 3. The cell then owns a basal, a soma and an apical compartment
in layer 5, plus one apical compartment in each of layers 4 and 3.
*/

use crate::layers::LayerOntology;
use crate::types::{BuildError, BuildResult, ConfigurationError, LayerIdx};
use cxbuild_tables::{format_float, KeyedTable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Home layer and farthest layer reached by the apical dendrite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApicalExtent {
    pub source: LayerIdx,
    pub target: LayerIdx,
}

/// Compartment category of a pyramidal cell at one layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompartmentCategory {
    /// Home layer: basal dendrite, soma and first apical compartment
    Soma,
    /// Apical compartment strictly between home and farthest layer
    ApicalProximal,
    /// Apical compartment in the farthest layer
    ApicalDistal,
}

impl ApicalExtent {
    pub fn new(source: LayerIdx, target: LayerIdx) -> Self {
        Self { source, target }
    }

    /// Apical compartments outside the home layer
    pub fn nonsoma_compartments(&self) -> usize {
        self.source - self.target
    }

    /// Whether the dendritic tree reaches `layer`
    pub fn spans(&self, layer: LayerIdx) -> bool {
        (self.target..=self.source).contains(&layer)
    }

    /// Category of the compartment at `layer`, `None` outside the extent
    pub fn compartment_at(&self, layer: LayerIdx) -> Option<CompartmentCategory> {
        if !self.spans(layer) {
            None
        } else if layer == self.source {
            Some(CompartmentCategory::Soma)
        } else if layer == self.target {
            Some(CompartmentCategory::ApicalDistal)
        } else {
            Some(CompartmentCategory::ApicalProximal)
        }
    }

    /// Layers counted from the home layer up to `layer`
    pub fn offset_of(&self, layer: LayerIdx) -> usize {
        self.source.saturating_sub(layer)
    }
}

impl fmt::Display for ApicalExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}->{}]", self.source, self.target)
    }
}

impl FromStr for ApicalExtent {
    type Err = BuildError;

    /// Parse `[source->target]` with integer layer indices
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, target) = split_extent(s)
            .ok_or_else(|| BuildError::data_shape(format!("'{}' is not an extent '[a->b]'", s)))?;
        let parse = |text: &str| {
            text.parse::<LayerIdx>()
                .map_err(|_| BuildError::data_shape(format!("'{}' in extent '{}' is not a layer index", text, s)))
        };
        let extent = Self::new(parse(source)?, parse(target)?);
        if extent.source < extent.target {
            return Err(BuildError::data_shape(format!(
                "extent '{}' runs downwards from its home layer",
                s
            )));
        }
        Ok(extent)
    }
}

/// `"[L5->L1]"` -> `("L5", "L1")`
fn split_extent(text: &str) -> Option<(&str, &str)> {
    let inner = text.trim().strip_prefix('[')?.strip_suffix(']')?;
    let (source, target) = inner.split_once("->")?;
    Some((source.trim(), target.trim()))
}

/// Apical extents per home layer and pyramidal type, written with layer
/// names (`[L5->L1]`)
#[derive(Debug, Clone)]
pub struct ApicalDendriteMap {
    table: KeyedTable,
}

/// Column used for the generic `PC` type
const GENERIC_PC_COLUMN: &str = "PC1";

impl ApicalDendriteMap {
    /// The table must have a `layer` key column
    pub fn new(table: KeyedTable) -> Self {
        Self { table }
    }

    /// Extent of `type_name` cells living in `home_layer`, as layer indices
    ///
    /// `PC` reads the `PC1` column; any other type without its own column
    /// falls back to a generic `PC` column.
    ///
    /// # Errors
    /// Home layer not in the table, no column for the type, or an extent
    /// naming layers outside the request.
    pub fn extent_for(
        &self,
        home_layer: &str,
        type_name: &str,
        ontology: &LayerOntology,
    ) -> BuildResult<ApicalExtent> {
        if !self.table.has_row(home_layer) {
            return Err(ConfigurationError::MissingApicalLayer(home_layer.to_string()).into());
        }

        let column = if type_name == "PC" {
            GENERIC_PC_COLUMN
        } else {
            type_name
        };
        let text = self
            .table
            .get(home_layer, column)
            .or_else(|| self.table.get(home_layer, "PC"))
            .ok_or_else(|| ConfigurationError::MissingApicalSubtype {
                layer: home_layer.to_string(),
                subtype: type_name.to_string(),
            })?;

        let invalid = |reason: String| ConfigurationError::InvalidApicalExtent {
            layer: home_layer.to_string(),
            subtype: type_name.to_string(),
            extent: text.to_string(),
            reason,
        };
        let (source, target) =
            split_extent(text).ok_or_else(|| invalid("expected '[source->target]'".to_string()))?;
        let index = |name: &str| {
            ontology
                .index_of(name)
                .ok_or_else(|| invalid(format!("layer '{}' is not requested", name)))
        };
        let extent = ApicalExtent::new(index(source)?, index(target)?);
        if extent.source < extent.target {
            return Err(invalid("target layer lies below the home layer".to_string()).into());
        }
        Ok(extent)
    }
}

/// Reference pyramidal cell: basal, soma and one apical compartment
const REFERENCE_FRACTIONS: [f64; 3] = [0.55, 0.05, 0.20];
/// Membrane area of the three-compartment reference cell, µm²
const REFERENCE_AREA_UM2: f64 = 11000.0;
const BASAL_TO_SOMA_RA_MOHM: u32 = 100;
const APICAL_RA_MOHM: u32 = 150;

/// Electrical layout of a pyramidal cell derived from its apical extent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentalParameters {
    pub nonsoma_compartments: usize,
    /// basal, soma, apical0, apical1, ...; sums to 1
    pub area_fractions: Vec<f64>,
    /// Mohm; basal-to-soma first, then one per apical compartment
    pub axial_resistance: Vec<u32>,
    pub total_area_um2: f64,
}

impl CompartmentalParameters {
    pub fn from_extent(extent: &ApicalExtent) -> Self {
        let nonsoma = extent.nonsoma_compartments();
        let apical = REFERENCE_FRACTIONS[2];

        let mut fractions: Vec<f64> = REFERENCE_FRACTIONS.to_vec();
        fractions.extend(std::iter::repeat(apical).take(nonsoma));
        let sum: f64 = fractions.iter().sum();
        let area_fractions = fractions.iter().map(|f| f / sum).collect();

        let apical_compartments = 1 + nonsoma;
        let mut axial_resistance = vec![BASAL_TO_SOMA_RA_MOHM];
        axial_resistance.extend(std::iter::repeat(APICAL_RA_MOHM).take(apical_compartments));

        let basal = REFERENCE_FRACTIONS[0] * REFERENCE_AREA_UM2;
        let soma = REFERENCE_FRACTIONS[1] * REFERENCE_AREA_UM2;
        let apical_area = apical * REFERENCE_AREA_UM2;
        let total_area_um2 = basal + soma + apical_area * apical_compartments as f64;

        Self {
            nonsoma_compartments: nonsoma,
            area_fractions,
            axial_resistance,
            total_area_um2,
        }
    }

    /// `{2: array([0.46, 0.04, 0.17, 0.17, 0.17])}`
    pub fn fract_areas_literal(&self) -> String {
        let values: Vec<String> = self
            .area_fractions
            .iter()
            .map(|f| format_float((f * 100.0).round() / 100.0))
            .collect();
        format!("{{{}: array([{}])}}", self.nonsoma_compartments, values.join(", "))
    }

    /// `[100, 150, 150, 150 ] * Mohm`
    pub fn ra_literal(&self) -> String {
        let apical: Vec<String> = self.axial_resistance[1..].iter().map(u32::to_string).collect();
        format!("[{}, {} ] * Mohm", self.axial_resistance[0], apical.join(", "))
    }

    /// `8800.0 * um**2`
    pub fn area_literal(&self) -> String {
        format!("{} * um**2", format_float(self.total_area_um2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxbuild_tables::{LayerMappingRecord, RawTable};

    fn ontology(layers: &[&str]) -> LayerOntology {
        let records: Vec<LayerMappingRecord> = layers
            .iter()
            .map(|l| LayerMappingRecord {
                csv_layers: l.to_string(),
                down_mapping1: None,
                down_mapping2: None,
                down_mapping3: None,
                sub_proportion: 1.0,
                census_layer: None,
            })
            .collect();
        let requested: Vec<String> = layers.iter().map(|s| s.to_string()).collect();
        LayerOntology::map(&requested, &records).unwrap()
    }

    fn apical_map() -> ApicalDendriteMap {
        let raw = RawTable::from_rows(vec![
            vec!["layer", "PC1", "PC2"],
            vec!["L23", "[L23->L1]", "[L23->L23]"],
            vec!["L5", "[L5->L1]", "[L5->L4]"],
        ]);
        ApicalDendriteMap::new(KeyedTable::from_raw(raw, "layer", "apical").unwrap())
    }

    #[test]
    fn test_extent_parse_and_render() {
        let extent: ApicalExtent = "[5->3]".parse().unwrap();
        assert_eq!(extent, ApicalExtent::new(5, 3));
        assert_eq!(extent.to_string(), "[5->3]");
        assert!("5->3".parse::<ApicalExtent>().is_err());
        assert!("[3->5]".parse::<ApicalExtent>().is_err());
    }

    #[test]
    fn test_compartment_categories_along_extent() {
        let extent = ApicalExtent::new(5, 2);
        assert_eq!(extent.compartment_at(5), Some(CompartmentCategory::Soma));
        assert_eq!(extent.compartment_at(4), Some(CompartmentCategory::ApicalProximal));
        assert_eq!(extent.compartment_at(3), Some(CompartmentCategory::ApicalProximal));
        assert_eq!(extent.compartment_at(2), Some(CompartmentCategory::ApicalDistal));
        assert_eq!(extent.compartment_at(1), None);
        assert_eq!(extent.compartment_at(6), None);
        assert_eq!(extent.offset_of(2), 3);

        let local = ApicalExtent::new(3, 3);
        assert_eq!(local.compartment_at(3), Some(CompartmentCategory::Soma));
    }

    #[test]
    fn test_extent_lookup_by_home_layer_and_type() {
        let layers = ontology(&["L1", "L23", "L4", "L5"]);
        let map = apical_map();
        assert_eq!(map.extent_for("L5", "PC", &layers).unwrap(), ApicalExtent::new(4, 1));
        assert_eq!(map.extent_for("L5", "PC2", &layers).unwrap(), ApicalExtent::new(4, 3));
        assert_eq!(map.extent_for("L23", "PC2", &layers).unwrap(), ApicalExtent::new(2, 2));

        assert!(matches!(
            map.extent_for("L4", "PC", &layers),
            Err(BuildError::Configuration(ConfigurationError::MissingApicalLayer(_)))
        ));
        assert!(matches!(
            map.extent_for("L5", "PC3", &layers),
            Err(BuildError::Configuration(ConfigurationError::MissingApicalSubtype { .. }))
        ));
    }

    #[test]
    fn test_extent_naming_unrequested_layer_is_rejected() {
        let layers = ontology(&["L23", "L5"]);
        let err = apical_map().extent_for("L5", "PC", &layers).unwrap_err();
        assert!(err.to_string().contains("'L1'"));
    }

    #[test]
    fn test_five_compartment_fractions() {
        let params = CompartmentalParameters::from_extent(&ApicalExtent::new(5, 3));
        assert_eq!(params.nonsoma_compartments, 2);
        assert_eq!(params.area_fractions.len(), 5);
        let sum: f64 = params.area_fractions.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert_eq!(params.area_fractions[3], params.area_fractions[2]);
        assert_eq!(params.area_fractions[4], params.area_fractions[2]);

        assert_eq!(params.fract_areas_literal(), "{2: array([0.46, 0.04, 0.17, 0.17, 0.17])}");
        assert_eq!(params.ra_literal(), "[100, 150, 150, 150 ] * Mohm");
        assert_eq!(params.axial_resistance.len(), 4);
        assert!((params.total_area_um2 - 13200.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_layer_pyramid_matches_reference() {
        let params = CompartmentalParameters::from_extent(&ApicalExtent::new(2, 2));
        assert_eq!(params.fract_areas_literal(), "{0: array([0.69, 0.06, 0.25])}");
        assert_eq!(params.ra_literal(), "[100, 150 ] * Mohm");
        assert!((params.total_area_um2 - 8800.0).abs() < 1e-6);
    }
}
