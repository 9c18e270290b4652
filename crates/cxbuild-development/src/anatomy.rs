// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Anatomy table split and merge.

The anatomy configuration is a row-tagged table: `G` rows are neuron
groups, `S` rows are synapses, and the row right above the first tagged row
of a section names its columns. Typed [`NeuronGroup`]s and
[`Synapse`](crate::synapses::Synapse)s are
turned into rows here and nowhere else.

In replace mode the existing section is swapped for the new rows. In append
mode the new rows go right after the last existing row of the section.
Rows outside the two sections are kept in place.
*/

use crate::groups::{group_from_columns, BackgroundInputs, LayerPlacement, NeuronGroup};
use crate::synapses::SynapseTable;
use crate::types::{BuildError, BuildResult, ConfigurationError, GroupIdx};
use cxbuild_tables::{RawTable, SectionLayout, TaggedSection};
use tracing::{debug, info};

pub const GROUP_TAG: &str = "G";
pub const SYNAPSE_TAG: &str = "S";

const TABLE: &str = "anatomy";
const UNSET: &str = "--";

/// How new rows meet the rows of an existing section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    Replace,
    Append,
}

impl MergeMode {
    pub fn from_replace_flag(replace_existing: bool) -> Self {
        if replace_existing {
            MergeMode::Replace
        } else {
            MergeMode::Append
        }
    }
}

/// Constant columns of exported rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDefaults {
    pub group_monitors: String,
    pub synapse_type: String,
}

/// The anatomy configuration table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnatomyTable {
    raw: RawTable,
}

impl AnatomyTable {
    pub fn new(raw: RawTable) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &RawTable {
        &self.raw
    }

    pub fn into_raw(self) -> RawTable {
        self.raw
    }

    fn section(&self, tag: &str) -> BuildResult<TaggedSection> {
        TaggedSection::locate(&self.raw, tag)?
            .ok_or_else(|| ConfigurationError::MissingAnatomySection(tag.to_string()).into())
    }

    /// Existing `G` rows as typed groups
    ///
    /// # Errors
    /// No `G` section, or a row whose idx, count or layer_idx does not parse.
    pub fn parse_groups(&self) -> BuildResult<Vec<NeuronGroup>> {
        let section = self.section(GROUP_TAG)?;
        let layout = &section.layout;

        section
            .records(&self.raw)
            .map(|row| -> BuildResult<NeuronGroup> {
                let idx: GroupIdx = parse_count(layout.require(row, "idx", TABLE)?, "idx")? as GroupIdx;
                let neuron_type = layout.require(row, "neuron_type", TABLE)?;
                let neuron_subtype = layout.require(row, "neuron_subtype", TABLE)?;
                let number_of_neurons = layout
                    .get(row, "number_of_neurons")
                    .map(|v| parse_count(v, "number_of_neurons"))
                    .transpose()?
                    .unwrap_or(0);
                let placement: LayerPlacement = layout.require(row, "layer_idx", TABLE)?.parse()?;
                let count = |column: &str| -> BuildResult<u32> {
                    Ok(layout
                        .get(row, column)
                        .map(|v| parse_count(v, column))
                        .transpose()?
                        .unwrap_or(0) as u32)
                };
                let background = BackgroundInputs {
                    n_background_inputs: count("n_background_inputs")?,
                    n_background_inhibition: count("n_background_inhibition")?,
                };
                Ok(group_from_columns(
                    idx,
                    neuron_type,
                    neuron_subtype,
                    number_of_neurons,
                    placement,
                    background,
                ))
            })
            .collect()
    }

    /// idx of the first new group: 1 when replacing, one past the last
    /// existing group when appending
    pub fn first_new_group_idx(&self, mode: MergeMode) -> BuildResult<GroupIdx> {
        match mode {
            MergeMode::Replace => Ok(1),
            MergeMode::Append => Ok(self
                .parse_groups()?
                .last()
                .map(|g| g.idx + 1)
                .unwrap_or(1)),
        }
    }

    /// Write `groups` into the `G` section
    pub fn merge_groups(&mut self, groups: &[NeuronGroup], defaults: &RowDefaults, mode: MergeMode) -> BuildResult<()> {
        let section = self.section(GROUP_TAG)?;
        let rows: Vec<Vec<String>> = groups
            .iter()
            .map(|group| group_row(&section.layout, group, defaults))
            .collect();

        debug!(target: "cxbuild-development",
            "   {:?} {} group rows at anatomy row {}", mode, rows.len(), section.first());
        self.merge(&section, rows, mode);
        Ok(())
    }

    /// Write `synapses` into the `S` section
    pub fn merge_synapses(&mut self, synapses: &SynapseTable, defaults: &RowDefaults, mode: MergeMode) -> BuildResult<()> {
        let section = self.section(SYNAPSE_TAG)?;
        let layout = &section.layout;
        let rows: Vec<Vec<String>> = synapses
            .iter()
            .map(|synapse| {
                layout.build_row(
                    SYNAPSE_TAG,
                    &[
                        ("receptor", synapse.receptor.to_string()),
                        ("pre_syn_idx", synapse.pre_syn_idx.to_string()),
                        ("post_syn_idx", synapse.post.to_string()),
                        ("syn_type", defaults.synapse_type.clone()),
                        ("p", synapse.p_literal()),
                        ("n", synapse.n_literal()),
                        ("monitors", UNSET.to_string()),
                        ("load_connection", "0".to_string()),
                        ("save_connection", "0".to_string()),
                        ("custom_weight", UNSET.to_string()),
                    ],
                )
            })
            .collect();

        debug!(target: "cxbuild-development",
            "   {:?} {} synapse rows at anatomy row {}", mode, rows.len(), section.first());
        self.merge(&section, rows, mode);
        Ok(())
    }

    fn merge(&mut self, section: &TaggedSection, rows: Vec<Vec<String>>, mode: MergeMode) {
        let count = rows.len();
        match mode {
            MergeMode::Replace => self.raw.splice(section.first()..section.end(), rows),
            MergeMode::Append => self.raw.splice(section.end()..section.end(), rows),
        }
        info!(target: "cxbuild-development",
            "  ✅ {} '{}' rows merged ({:?})", count, section.tag, mode);
    }
}

fn group_row(layout: &SectionLayout, group: &NeuronGroup, defaults: &RowDefaults) -> Vec<String> {
    layout.build_row(
        GROUP_TAG,
        &[
            ("idx", group.idx.to_string()),
            ("number_of_neurons", group.number_of_neurons.to_string()),
            ("neuron_type", group.neuron_type().to_string()),
            ("neuron_subtype", group.neuron_subtype.clone()),
            ("layer_idx", group.placement.to_string()),
            ("net_center", UNSET.to_string()),
            ("monitors", defaults.group_monitors.clone()),
            ("n_background_inputs", group.background.n_background_inputs.to_string()),
            ("n_background_inhibition", group.background.n_background_inhibition.to_string()),
            ("noise_sigma", UNSET.to_string()),
            ("gemean", UNSET.to_string()),
            ("gestd", UNSET.to_string()),
            ("gimean", UNSET.to_string()),
            ("gistd", UNSET.to_string()),
        ],
    )
}

/// Non-negative integer cell; `120.0` reads as 120
fn parse_count(value: &str, column: &str) -> BuildResult<u64> {
    if let Ok(count) = value.parse::<u64>() {
        return Ok(count);
    }
    match value.parse::<f64>() {
        Ok(v) if v >= 0.0 && v.fract() == 0.0 => Ok(v as u64),
        _ => Err(BuildError::data_shape(format!(
            "{} column '{}' holds '{}', expected a non-negative integer",
            TABLE, column, value
        ))),
    }
}
