// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Every table one build reads, loaded up front

use crate::cell_types::{CellTypeCensus, CellTypeDataSource};
use crate::compartments::ApicalDendriteMap;
use crate::types::BuildResult;
use cxbuild_config::CxBuildConfig;
use cxbuild_tables::reader::read_json;
use cxbuild_tables::{
    read_records, CensusRecord, CompartmentRuleRecord, ConnectionRecord, ContactPermissionRecord,
    EphysTemplates, KeyedTable, LayerMappingRecord, RawTable,
};
use tracing::info;

/// Key column of the area statistics table
pub const AREA_STATS_KEY: &str = "stat";
/// Key column of the apical dendrite table
pub const APICAL_KEY: &str = "layer";

/// Reference tables, survey connections and the anatomy/physiology tables
/// to extend
#[derive(Debug, Clone)]
pub struct BuildInputs {
    pub layer_mapping: Vec<LayerMappingRecord>,
    pub census: Vec<CensusRecord>,
    pub area_stats: KeyedTable,
    pub apical_dendrites: ApicalDendriteMap,
    pub ephys_templates: EphysTemplates,
    pub excitatory_connections: Vec<ConnectionRecord>,
    pub inhibitory_connections: Vec<ConnectionRecord>,
    pub compartment_rules: Vec<CompartmentRuleRecord>,
    pub contact_permissions: Vec<ContactPermissionRecord>,
    pub cell_type_census: Option<CellTypeCensus>,
    pub anatomy: RawTable,
    pub physiology: RawTable,
}

impl BuildInputs {
    /// Read every input named by `config.paths`
    ///
    /// # Errors
    /// An unreadable or malformed table, an unsupported file extension, or
    /// an unknown cell type data source.
    pub fn load(config: &CxBuildConfig) -> BuildResult<Self> {
        let paths = &config.paths;
        info!(target: "cxbuild-development", "📂 Loading tables from {}", paths.tables_dir.display());

        let data_source: CellTypeDataSource = config.cell_types.data_source.parse()?;
        let census_path = config.cell_types.census_path().map(|p| paths.table(&p.to_string_lossy()));
        let cell_type_census = match (data_source, census_path) {
            (CellTypeDataSource::Markram, Some(path)) => Some(CellTypeCensus::Markram(read_json(&path)?)),
            (CellTypeDataSource::Allen, Some(path)) => Some(CellTypeCensus::Allen(read_records(&path)?)),
            _ => None,
        };

        let inputs = Self {
            layer_mapping: read_records(&paths.table(&paths.layer_mapping_file))?,
            census: read_records(&paths.table(&paths.census_file))?,
            area_stats: KeyedTable::read_csv(&paths.table(&paths.area_stats_file), AREA_STATS_KEY)?,
            apical_dendrites: ApicalDendriteMap::new(KeyedTable::read_csv(
                &paths.table(&paths.apical_dendrites_file),
                APICAL_KEY,
            )?),
            ephys_templates: EphysTemplates::read_csv(&paths.table(&paths.ephys_templates_file))?,
            excitatory_connections: read_records(&paths.ni_table(&paths.excitatory_connections_file))?,
            inhibitory_connections: read_records(&paths.ni_table(&paths.inhibitory_connections_file))?,
            compartment_rules: read_records(&paths.table(&paths.compartment_rules_file))?,
            contact_permissions: read_records(&paths.table(&paths.contact_permissions_file))?,
            cell_type_census,
            anatomy: RawTable::read_csv(&paths.config_file(&paths.anatomy_file))?,
            physiology: RawTable::read_csv(&paths.config_file(&paths.physiology_file))?,
        };

        info!(target: "cxbuild-development",
            "  ✅ {} mapping rows, {} census layers, {} + {} survey connections",
            inputs.layer_mapping.len(), inputs.census.len(),
            inputs.excitatory_connections.len(), inputs.inhibitory_connections.len());
        Ok(inputs)
    }
}
