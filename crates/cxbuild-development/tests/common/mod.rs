// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures: a small three-layer V1 build (L1, L23, L5) kept as CSV
//! text so the same tables serve in-memory and on-disk tests.

#![allow(dead_code)]

use cxbuild_config::CxBuildConfig;
use cxbuild_development::{ApicalDendriteMap, BuildInputs};
use cxbuild_tables::reader::csv_records;
use cxbuild_tables::{EphysTemplates, KeyedTable, RawTable};
use std::collections::BTreeMap;
use std::path::Path;

pub const LAYER_MAPPING: &str = "\
csv_layers,down_mapping1,down_mapping2,down_mapping3,sub_proportion,table2_df
1,L1,,,1.0,L1
2/3,L23,,,1.0,L23
4A,L4A,L4,,1.0,L4A
5,L5,,,1.0,L5
6,L6,,,1.0,L6
";

pub const CENSUS: &str = "\
layer,n_neurons_10e6,percent_inhibitory
L1,0.0001,100
L23,0.002,20
L4A,0.001,15
L5,0.001,25
L6,0.001,20
";

/// No V1 column: the patch is simulated as the whole area
pub const AREA_STATS: &str = "\
stat,V2
mean,1000
";

pub const APICAL_DENDRITES: &str = "\
layer,PC1,PC
L23,[L23->L1],[L23->L1]
L5,[L5->L1],[L5->L1]
";

pub const EPHYS_TEMPLATES: &str = "\
Key,SS,BC,MC
C,100*pF,100*pF,100*pF
gL,4*nS,10*nS,5*nS
,,,
CompartmentalNeurons,,,
Key,PC,,
C,1*uF*cm**-2,,
fract_areas,template,,
Ra,template,,
Area_tot_pyram,template,,
";

pub const EXCITATORY_CONNECTIONS: &str = "\
FromArea,ToArea,FromLayer,ToLayer,Strength,References
V1,V1,2/3,2/3,D,Lund 1991
V1,V1,5,2/3,M,Lund 1991
V1,V1,2/3,5,S,Lund 1991
V1,V1,4A,2/3,D,Lund 1991
V2,V2,2/3,2/3,D,Rockland 1997
";

pub const INHIBITORY_CONNECTIONS: &str = "\
FromArea,ToArea,FromLayer,ToLayer,Strength,References
V1,V1,1,1,M,Lund 1991
V1,V1,2/3,2/3,D,Lund 1991
V1,V1,5,5,D,Lund 1991
";

pub const CONTACT_PERMISSIONS: &str = "\
Presynaptic Cell Types,Postsynaptic Cell Types,Postsynaptic Cell Weights
SS,\"PC, SS, BC, MC\",\"1, 1, 1, 1\"
PC,\"PC, SS, BC, MC\",\"1, 1, 0.5, 0.5\"
BC,\"PC, SS, BC\",\"1, 1, 1\"
MC,\"PC, BC\",\"1, 1\"
";

pub const COMPARTMENT_RULES: &str = "\
Presynaptic Cell Types,Distribution
SS,\"0.5, 0, 0.5, 0, 0\"
PC,\"0.6, 0, 0.2, 0.1, 0.1\"
BC,\"0, 1, 0, 0, 0\"
MC,\"0, 0, 0, 0.5, 1\"
";

pub const ANATOMY: &str = "\
params,runtime,500*ms
row_type,idx,number_of_neurons,neuron_type,neuron_subtype,layer_idx,net_center,monitors,n_background_inputs,n_background_inhibition,noise_sigma,gemean,gestd,gimean,gistd
G,1,50,SS,L4_SS,1,--,[Sp],200,0,--,--,--,--,--
G,2,20,BC,L4_BC,1,--,[Sp],200,0,--,--,--,--,--
row_type,receptor,pre_syn_idx,post_syn_idx,syn_type,p,n,monitors,load_connection,save_connection,custom_weight
S,ge,1,2,Fixed,0.1,1,--,0,0,--
S,gi,2,1,Fixed,0.1,1,--,0,0,--
";

pub const PHYSIOLOGY: &str = "\
runtime,500*ms,
### NEURON GROUP PARAMETERS ###,,
,,
OLD_SS,C,1*pF
,,
";

pub const PHYSIOLOGY_WITH_INPUT: &str = "\
runtime,500*ms,
### NEURON GROUP PARAMETERS ###,,
relay_vpm,,
,,
OLD_SS,C,1*pF
,,
";

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Configuration matching the fixture tables
pub fn config() -> CxBuildConfig {
    let mut config = CxBuildConfig::default();
    config.layers.requested = names(&["L1", "L23", "L5"]);
    config.cell_types.excitatory_types = names(&["SS", "PC"]);
    config.cell_types.inhibitory_types = names(&["BC", "MC"]);
    config.cell_types.excitatory_proportions = BTreeMap::from([
        ("L1".to_string(), vec![0.0, 0.0]),
        ("L23".to_string(), vec![0.0, 1.0]),
        ("L5".to_string(), vec![0.5, 0.5]),
    ]);
    config.cell_types.inhibitory_proportions = BTreeMap::from([
        ("L1".to_string(), vec![1.0, 0.0]),
        ("L23".to_string(), vec![0.5, 0.5]),
        ("L5".to_string(), vec![0.5, 0.5]),
    ]);
    config.input.target_layer = "L23".to_string();
    config.input.connection_probability = 1.0;
    config
}

fn raw(text: &str) -> RawTable {
    RawTable::from_csv_reader(text.as_bytes(), "fixture").unwrap()
}

/// The fixture tables, parsed in memory
pub fn inputs(physiology: &str) -> BuildInputs {
    BuildInputs {
        layer_mapping: csv_records(LAYER_MAPPING.as_bytes(), "layer mapping").unwrap(),
        census: csv_records(CENSUS.as_bytes(), "census").unwrap(),
        area_stats: KeyedTable::from_raw(raw(AREA_STATS), "stat", "area stats").unwrap(),
        apical_dendrites: ApicalDendriteMap::new(
            KeyedTable::from_raw(raw(APICAL_DENDRITES), "layer", "apical dendrites").unwrap(),
        ),
        ephys_templates: EphysTemplates::from_raw(&raw(EPHYS_TEMPLATES)).unwrap(),
        excitatory_connections: csv_records(EXCITATORY_CONNECTIONS.as_bytes(), "excitatory").unwrap(),
        inhibitory_connections: csv_records(INHIBITORY_CONNECTIONS.as_bytes(), "inhibitory").unwrap(),
        compartment_rules: csv_records(COMPARTMENT_RULES.as_bytes(), "compartments").unwrap(),
        contact_permissions: csv_records(CONTACT_PERMISSIONS.as_bytes(), "permissions").unwrap(),
        cell_type_census: None,
        anatomy: raw(ANATOMY),
        physiology: raw(physiology),
    }
}

/// Write the fixture tables under `root` and point `config.paths` at them
pub fn write_fixture(root: &Path, config: &mut CxBuildConfig) {
    let tables = root.join("tables");
    let ni = root.join("ni_csv_copy");
    let configs = root.join("config_files");
    for dir in [&tables, &ni, &configs] {
        std::fs::create_dir_all(dir).unwrap();
    }

    let paths = &mut config.paths;
    paths.tables_dir = tables.clone();
    paths.ni_csv_dir = ni.clone();
    paths.config_files_dir = configs.clone();

    let files = [
        (tables.join(&paths.layer_mapping_file), LAYER_MAPPING),
        (tables.join(&paths.census_file), CENSUS),
        (tables.join(&paths.area_stats_file), AREA_STATS),
        (tables.join(&paths.apical_dendrites_file), APICAL_DENDRITES),
        (tables.join(&paths.ephys_templates_file), EPHYS_TEMPLATES),
        (tables.join(&paths.compartment_rules_file), COMPARTMENT_RULES),
        (tables.join(&paths.contact_permissions_file), CONTACT_PERMISSIONS),
        (ni.join(&paths.excitatory_connections_file), EXCITATORY_CONNECTIONS),
        (ni.join(&paths.inhibitory_connections_file), INHIBITORY_CONNECTIONS),
        (configs.join(&paths.anatomy_file), ANATOMY),
        (configs.join(&paths.physiology_file), PHYSIOLOGY),
    ];
    for (path, text) in files {
        std::fs::write(path, text).unwrap();
    }
}
