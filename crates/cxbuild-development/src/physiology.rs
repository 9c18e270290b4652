// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-subtype physiology blocks
//!
//! The physiology table holds global simulation parameters down to a marker
//! row. Everything after the marker is regenerated: one parameter block per
//! neuron subtype, taken from the ephys template columns.

use crate::compartments::CompartmentalParameters;
use crate::groups::{GroupTable, NeuronGroup};
use crate::types::{BuildResult, ConfigurationError};
use cxbuild_tables::{EphysTemplates, RawTable};
use tracing::{debug, info, warn};

/// First cell of the row after which subtype parameters start
pub const GROUP_PARAMETERS_MARKER: &str = "### NEURON GROUP PARAMETERS ###";

/// Keys whose template value is replaced for compartmental cells
const FRACT_AREAS_KEY: &str = "fract_areas";
const RA_KEY: &str = "Ra";
const AREA_KEY: &str = "Area_tot_pyram";

/// Input group named right after the marker row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputStub {
    pub name: String,
}

/// Physiology table cut at the marker row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysiologyTable {
    stub: RawTable,
    input_stub: Option<InputStub>,
}

impl PhysiologyTable {
    /// Keep the rows up to the marker, plus an input stub when the row after
    /// the marker names a group and the next row is blank
    ///
    /// # Errors
    /// No marker row.
    pub fn split(raw: &RawTable) -> BuildResult<Self> {
        let marker = raw
            .position(|row| row.first().map(|c| c.trim()) == Some(GROUP_PARAMETERS_MARKER))
            .ok_or_else(|| ConfigurationError::MissingSectionMarker {
                marker: GROUP_PARAMETERS_MARKER.to_string(),
                table: "physiology".to_string(),
            })?;

        let first_blank = raw
            .rows()
            .iter()
            .enumerate()
            .skip(marker + 1)
            .find(|(_, row)| RawTable::is_blank_row(row))
            .map(|(index, _)| index);

        if first_blank == Some(marker + 2) {
            let name = raw.cell(marker + 1, 0).trim().to_string();
            warn!(target: "cxbuild-development", "⚠️  Adding assumed input group {}", name);
            return Ok(Self {
                stub: raw.head(marker + 3),
                input_stub: Some(InputStub { name }),
            });
        }

        Ok(Self {
            stub: raw.head(marker + 1),
            input_stub: None,
        })
    }

    pub fn input_stub(&self) -> Option<&InputStub> {
        self.input_stub.as_ref()
    }

    pub fn stub(&self) -> &RawTable {
        &self.stub
    }

    /// The stub followed by one block per unique subtype of `groups`
    pub fn with_groups(&self, groups: &GroupTable, templates: &EphysTemplates) -> BuildResult<RawTable> {
        info!(target: "cxbuild-development",
            "🧪 Deriving physiology for {} neuron groups", groups.len());

        let mut table = self.stub.clone();
        let mut written = 0;
        for group in groups.groups() {
            let block = ParameterBlock::derive(group, templates)?;
            table.extend(block.rows());
            written += 1;
        }

        info!(target: "cxbuild-development", "  ✅ {} parameter blocks", written);
        Ok(table)
    }
}

/// Parameters of one neuron subtype
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBlock {
    pub neuron_subtype: String,
    pub parameters: Vec<(String, String)>,
}

impl ParameterBlock {
    /// Template lookup: point column of the neuron type, then compartmental
    /// column, then the generic `PC` compartmental column for pyramidal
    /// groups. Compartmental cells get their area and resistance layout from
    /// the group's apical extent.
    ///
    /// # Errors
    /// No template column for the neuron type, or a compartmental group
    /// without an apical extent.
    pub fn derive(group: &NeuronGroup, templates: &EphysTemplates) -> BuildResult<Self> {
        let neuron_type = group.neuron_type();

        let parameters = if let Some(column) = templates.point.column(neuron_type) {
            column
        } else if let Some(column) = templates.compartmental.column(neuron_type) {
            Self::masked(group, column)?
        } else if group.is_pyramidal() {
            let column = templates
                .compartmental
                .column("PC")
                .ok_or_else(|| ConfigurationError::UnknownNeuronType(neuron_type.to_string()))?;
            Self::masked(group, column)?
        } else {
            return Err(ConfigurationError::UnknownNeuronType(neuron_type.to_string()).into());
        };

        debug!(target: "cxbuild-development",
            "   {} <- {} ({} keys)", group.neuron_subtype, neuron_type, parameters.len());
        Ok(Self {
            neuron_subtype: group.neuron_subtype.clone(),
            parameters: parameters.into_iter().filter(|(_, value)| !value.is_empty()).collect(),
        })
    }

    fn masked(group: &NeuronGroup, column: Vec<(String, String)>) -> BuildResult<Vec<(String, String)>> {
        let extent = group.placement.extent().ok_or_else(|| ConfigurationError::MissingApicalSubtype {
            layer: group.placement.to_string(),
            subtype: group.neuron_subtype.clone(),
        })?;
        let compartments = CompartmentalParameters::from_extent(extent);

        Ok(column
            .into_iter()
            .map(|(key, value)| {
                let value = match key.as_str() {
                    FRACT_AREAS_KEY => compartments.fract_areas_literal(),
                    RA_KEY => compartments.ra_literal(),
                    AREA_KEY => compartments.area_literal(),
                    _ => value,
                };
                (key, value)
            })
            .collect())
    }

    /// `subtype,key0,value0` then `,key,value` rows and a closing blank row
    pub fn rows(&self) -> Vec<Vec<String>> {
        let mut rows: Vec<Vec<String>> = self
            .parameters
            .iter()
            .enumerate()
            .map(|(i, (key, value))| {
                let name = if i == 0 { self.neuron_subtype.clone() } else { String::new() };
                vec![name, key.clone(), value.clone()]
            })
            .collect();
        if rows.is_empty() {
            rows.push(vec![self.neuron_subtype.clone(), String::new(), String::new()]);
        }
        rows.push(vec![String::new(); 3]);
        rows
    }
}
