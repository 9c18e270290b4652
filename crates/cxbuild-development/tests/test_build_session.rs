// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Build session integration tests

Tests a full build over a three-layer V1 fixture covering:
- Group synthesis (subtypes, sizes, pyramidal extents)
- Synapse rows and their referential integrity
- Input group handling driven by the physiology table
- Anatomy merge in replace and append modes
- Failure modes (unknown layer, synapse capacity)
- Loading from and writing to disk
*/

mod common;

use cxbuild_development::{
    AnatomyTable, ApicalExtent, BuildError, BuildSession, BuildStage, ConfigurationError,
    LayerPlacement, PostTarget, Receptor, SomaSites,
};
use cxbuild_tables::RawTable;

/// Run the fixture build with `config`
fn build(
    config: cxbuild_config::CxBuildConfig,
    physiology: &str,
) -> cxbuild_development::BuildResult<cxbuild_development::BuildOutput> {
    let mut session = BuildSession::new(config);
    session.run(&common::inputs(physiology))
}

/// Rows whose first cell is `tag`
fn tagged_rows<'a>(table: &'a RawTable, tag: &'a str) -> impl Iterator<Item = &'a Vec<String>> + 'a {
    table.rows().iter().filter(move |row| row.first().map(|c| c.trim()) == Some(tag))
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_groups_follow_layers_and_cell_types() {
    let output = build(common::config(), common::PHYSIOLOGY).unwrap();
    let subtypes: Vec<&str> = output
        .groups
        .groups()
        .iter()
        .map(|g| g.neuron_subtype.as_str())
        .collect();

    assert_eq!(
        subtypes,
        ["L1_BC", "L23_PC", "L23_BC", "L23_MC", "L5_SS", "L5_PC", "L5_BC", "L5_MC"]
    );
    let indices: Vec<usize> = output.groups.groups().iter().map(|g| g.idx).collect();
    assert_eq!(indices, (1..=8).collect::<Vec<_>>());
    assert!(output.groups.input().is_none());
}

#[test]
fn test_group_sizes_split_layer_pools() {
    let output = build(common::config(), common::PHYSIOLOGY).unwrap();
    let size = |subtype: &str| output.groups.by_subtype(subtype).unwrap().number_of_neurons;

    // L23: 2000 neurons, 20% inhibitory
    assert_eq!(size("L23_PC"), 1600);
    assert_eq!(size("L23_BC"), 200);
    assert_eq!(size("L23_MC"), 200);
    // L5: 1000 neurons, 25% inhibitory, split evenly
    assert_eq!(size("L5_SS"), 375);
    assert_eq!(size("L5_PC"), 375);
    assert_eq!(size("L5_BC"), 125);
    assert_eq!(size("L5_MC"), 125);
    // L1 is purely inhibitory
    assert_eq!(size("L1_BC"), 100);
    assert_eq!(output.groups.total_neurons(), 3100);
}

#[test]
fn test_pyramidal_groups_carry_apical_extents() {
    let output = build(common::config(), common::PHYSIOLOGY).unwrap();

    let l23_pc = output.groups.by_subtype("L23_PC").unwrap();
    assert_eq!(l23_pc.placement, LayerPlacement::Extent(ApicalExtent::new(2, 1)));
    let l5_pc = output.groups.by_subtype("L5_PC").unwrap();
    assert_eq!(l5_pc.placement, LayerPlacement::Extent(ApicalExtent::new(3, 1)));
    let l5_ss = output.groups.by_subtype("L5_SS").unwrap();
    assert_eq!(l5_ss.placement, LayerPlacement::Layer(3));
}

#[test]
fn test_synapse_rows_for_fixture() {
    let output = build(common::config(), common::PHYSIOLOGY).unwrap();
    let synapses = output.synapses.synapses();

    // 15 excitatory rows from three layer pairs, 9 inhibitory rows
    assert_eq!(synapses.len(), 24);
    assert_eq!(synapses.iter().filter(|s| s.receptor == Receptor::Ge).count(), 15);

    // L23_PC onto its own soma: basal and apical sites of the PC rule
    let soma = synapses
        .iter()
        .find(|s| {
            s.pre_syn_idx == 2
                && s.post
                    == PostTarget::Compartment {
                        idx: 2,
                        offset: 0,
                        sites: Some(SomaSites {
                            basal: true,
                            soma: false,
                            apical: true,
                        }),
                    }
        })
        .unwrap();
    assert_eq!(soma.receptor, Receptor::Ge);
    assert_eq!(soma.p.len(), 2);
    assert!(approx(soma.p[0], 0.15 * 0.6));
    assert!(approx(soma.p[1], 0.15 * 0.2));
    assert_eq!(soma.n_literal(), "1+1");
    assert_eq!(soma.post.to_string(), "2[C]0ba");

    // L23_PC onto the apical trunk of L5_PC crossing L23
    let proximal = synapses
        .iter()
        .find(|s| s.pre_syn_idx == 2 && s.post.group_idx() == 6 && s.receptor == Receptor::Ge)
        .unwrap();
    assert_eq!(proximal.post.to_string(), "6[C]1");
    assert!(approx(proximal.p[0], 0.15 * 0.1));

    // contact weight 0.5 towards basket cells
    let basket = synapses
        .iter()
        .find(|s| s.pre_syn_idx == 2 && s.post == PostTarget::Group(3))
        .unwrap();
    assert!(approx(basket.p[0], 0.075));
}

#[test]
fn test_synapses_are_grouped_by_presynaptic_idx() {
    let output = build(common::config(), common::PHYSIOLOGY).unwrap();
    let keys: Vec<(usize, Receptor)> = output
        .synapses
        .iter()
        .map(|s| (s.pre_syn_idx, s.receptor))
        .collect();

    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn test_every_synapse_references_a_group() {
    let output = build(common::config(), common::PHYSIOLOGY_WITH_INPUT).unwrap();
    for synapse in output.synapses.iter() {
        assert!(output.groups.get(synapse.pre_syn_idx).is_some(), "{:?}", synapse);
        assert!(output.groups.get(synapse.post.group_idx()).is_some(), "{:?}", synapse);
        assert_eq!(synapse.p.len(), synapse.n.len());
        assert!(synapse.p.iter().all(|p| *p > 0.0));
    }

    // and the exported anatomy agrees
    let anatomy = AnatomyTable::new(output.anatomy.clone());
    let exported: Vec<usize> = anatomy.parse_groups().unwrap().iter().map(|g| g.idx).collect();
    for row in tagged_rows(&output.anatomy, "S") {
        let pre: usize = row[2].parse().unwrap();
        let post: PostTarget = row[3].parse().unwrap();
        assert!(pre == 0 || exported.contains(&pre));
        assert!(exported.contains(&post.group_idx()));
    }
}

#[test]
fn test_input_group_targets_requested_layer() {
    let output = build(common::config(), common::PHYSIOLOGY_WITH_INPUT).unwrap();
    assert!(output.context.has_input_group());
    assert_eq!(output.context.input_stub.as_ref().unwrap().name, "relay_vpm");

    let input = output.groups.input().unwrap();
    assert_eq!(input.idx, 0);
    assert_eq!(input.cell_type.name, "SS");

    let from_input: Vec<String> = output
        .synapses
        .iter()
        .filter(|s| s.pre_syn_idx == 0)
        .map(|s| format!("{}:{}", s.post, s.p_literal()))
        .collect();
    assert_eq!(from_input, ["2[C]0ba:0.5+0.5", "3:1.0", "4:1.0"]);
    assert_eq!(output.synapses.len(), 27);

    // the input group is never exported
    assert!(tagged_rows(&output.anatomy, "G").all(|row| row[1] != "0"));
}

#[test]
fn test_input_stub_survives_in_physiology() {
    let output = build(common::config(), common::PHYSIOLOGY_WITH_INPUT).unwrap();
    let first_column: Vec<&str> = output.physiology.rows().iter().map(|r| r[0].as_str()).collect();

    assert_eq!(first_column[2], "relay_vpm");
    assert!(!first_column.contains(&"OLD_SS"));
    for subtype in ["L1_BC", "L23_PC", "L5_SS", "L5_MC"] {
        assert!(first_column.contains(&subtype), "missing {}", subtype);
    }
}

#[test]
fn test_physiology_masks_pyramidal_templates() {
    let output = build(common::config(), common::PHYSIOLOGY).unwrap();
    let rows = output.physiology.rows();
    let start = rows.iter().position(|r| r[0] == "L23_PC").unwrap();
    let block: Vec<&Vec<String>> = rows[start..]
        .iter()
        .take_while(|r| !RawTable::is_blank_row(r))
        .collect();

    let value = |key: &str| block.iter().find(|r| r[1] == key).map(|r| r[2].clone());
    assert_eq!(value("C").as_deref(), Some("1*uF*cm**-2"));
    assert_ne!(value("fract_areas").as_deref(), Some("template"));
    assert_ne!(value("Ra").as_deref(), Some("template"));
}

#[test]
fn test_replace_mode_rewrites_group_section() {
    let output = build(common::config(), common::PHYSIOLOGY).unwrap();

    let subtypes: Vec<&str> = tagged_rows(&output.anatomy, "G").map(|r| r[4].as_str()).collect();
    assert_eq!(subtypes.len(), 8);
    assert!(!subtypes.contains(&"L4_SS"));
    assert_eq!(tagged_rows(&output.anatomy, "S").count(), 24);
    assert_eq!(output.anatomy.rows()[0][0], "params");

    let l23_pc = tagged_rows(&output.anatomy, "G").find(|r| r[4] == "L23_PC").unwrap();
    assert_eq!(l23_pc[5], "[2->1]");
    assert_eq!(l23_pc[3], "PC");
}

#[test]
fn test_append_mode_keeps_existing_groups() {
    let mut config = common::config();
    config.anatomy.replace_existing_groups = false;
    let output = build(config, common::PHYSIOLOGY).unwrap();

    let idx_of = |subtype: &str| output.groups.by_subtype(subtype).map(|g| g.idx);
    assert_eq!(idx_of("L4_SS"), Some(1));
    assert_eq!(idx_of("L4_BC"), Some(2));
    assert_eq!(idx_of("L1_BC"), Some(3));
    assert_eq!(idx_of("L5_MC"), Some(10));

    let exported: Vec<&str> = tagged_rows(&output.anatomy, "G").map(|r| r[4].as_str()).collect();
    assert_eq!(exported.len(), 10);
    assert_eq!(&exported[..2], ["L4_SS", "L4_BC"]);
    // the two existing synapse rows stay ahead of the new ones
    let synapse_rows: Vec<&Vec<String>> = tagged_rows(&output.anatomy, "S").collect();
    assert_eq!(synapse_rows.len(), 26);
    assert_eq!(synapse_rows[0][2], "1");
    assert_eq!(synapse_rows[0][3], "2");
}

#[test]
fn test_anatomy_layer_idx_round_trips() {
    let output = build(common::config(), common::PHYSIOLOGY).unwrap();
    let parsed = AnatomyTable::new(output.anatomy).parse_groups().unwrap();

    assert_eq!(parsed.len(), output.groups.len());
    for (exported, built) in parsed.iter().zip(output.groups.groups()) {
        assert_eq!(exported.idx, built.idx);
        assert_eq!(exported.neuron_subtype, built.neuron_subtype);
        assert_eq!(exported.placement, built.placement);
        assert_eq!(exported.number_of_neurons, built.number_of_neurons);
    }
}

#[test]
fn test_unknown_layer_fails_in_layer_mapping() {
    let mut config = common::config();
    config.layers.requested.push("L7".to_string());
    let mut session = BuildSession::new(config);

    let err = session.run(&common::inputs(common::PHYSIOLOGY)).unwrap_err();
    assert!(matches!(
        err,
        BuildError::Configuration(ConfigurationError::UnknownLayer { ref layer, .. }) if layer == "L7"
    ));
    assert_eq!(session.progress().stage, BuildStage::Failed);
}

#[test]
fn test_synapse_capacity_is_enforced() {
    let mut config = common::config();
    config.connections.max_synapse_rows = 10;

    let err = build(config, common::PHYSIOLOGY).unwrap_err();
    assert!(matches!(
        err,
        BuildError::Configuration(ConfigurationError::SynapseCapacityExceeded {
            needed: 24,
            capacity: 10
        })
    ));
}

#[test]
fn test_input_target_must_be_requested() {
    let mut config = common::config();
    config.input.target_layer = "L4C".to_string();

    let err = build(config.clone(), common::PHYSIOLOGY_WITH_INPUT).unwrap_err();
    assert!(matches!(
        err,
        BuildError::Configuration(ConfigurationError::InputTargetNotRequested(ref layer)) if layer == "L4C"
    ));

    // without an input group the target layer is never consulted
    assert!(build(config, common::PHYSIOLOGY).is_ok());
}

#[test]
fn test_progress_reports_counts() {
    let mut session = BuildSession::new(common::config());
    session.run(&common::inputs(common::PHYSIOLOGY)).unwrap();

    let progress = session.progress();
    assert_eq!(progress.stage, BuildStage::Completed);
    assert_eq!(progress.progress, 100);
    assert_eq!(progress.layers_mapped, 3);
    assert_eq!(progress.groups_created, 8);
    assert_eq!(progress.neurons_created, 3100);
    assert_eq!(progress.layer_connections, 6);
    assert_eq!(progress.synapses_created, 24);
}

#[test]
fn test_load_run_and_write_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::config();
    common::write_fixture(dir.path(), &mut config);

    let inputs = cxbuild_development::BuildInputs::load(&config).unwrap();
    let mut session = BuildSession::new(config.clone());
    let output = session.run(&inputs).unwrap();
    let (anatomy_path, physiology_path) = output.write(&config).unwrap();

    assert_eq!(
        anatomy_path,
        dir.path().join("config_files").join("pytest_anatomy_config_cxc.csv")
    );
    // rows come back padded to the table width
    let written = RawTable::read_csv(&anatomy_path).unwrap();
    assert_eq!(written.len(), output.anatomy.len());
    for (read, built) in written.rows().iter().zip(output.anatomy.rows()) {
        assert_eq!(&read[..built.len()], &built[..]);
    }
    let physiology = RawTable::read_csv(&physiology_path).unwrap();
    assert_eq!(physiology.rows()[1][0], "### NEURON GROUP PARAMETERS ###");

    // inputs are left untouched
    let original = std::fs::read_to_string(config.paths.config_file(&config.paths.anatomy_file)).unwrap();
    assert_eq!(original, common::ANATOMY);
}
