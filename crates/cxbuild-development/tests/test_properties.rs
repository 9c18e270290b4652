// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Property tests for layer mapping and group synthesis

Tests covering:
- Each survey sublayer maps to at most one requested layer
- Group-scope mappings are a subset of full-scope mappings
- Group indices are contiguous from the start index
- Group sizes add up to the layer pools
- Group sizes and order for a two-layer census
*/

use cxbuild_config::BackgroundConfig;
use cxbuild_development::{
    ApicalDendriteMap, CellTypeProportions, GroupSynthesizer, GroupTable, LayerOntology,
    MappingScope, PopulationModel, Transmitter,
};
use cxbuild_tables::reader::csv_records;
use cxbuild_tables::{CensusRecord, KeyedTable, LayerMappingRecord, RawTable};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};

/// V1 layer mapping with overlapping L4 aggregates
const V1_MAPPING: &str = "\
csv_layers,down_mapping1,down_mapping2,down_mapping3,sub_proportion,table2_df
1,L1,,,1.0,L1
2/3,L23,,,1.0,L23
4A,L4A,L4,,1.0,L4A
4B,L4B,L4,,1.0,L4B
4Ca,L4CA,L4C,L4,0.5,L4CA
4Cb,L4CB,L4C,L4,0.5,L4CB
5,L5,,,1.0,L5
6,L6,,,1.0,L6
";

const V1_LAYERS: &[&str] = &[
    "L1", "L23", "L4", "L4A", "L4B", "L4C", "L4CA", "L4CB", "L5", "L6",
];

fn mapping() -> Vec<LayerMappingRecord> {
    csv_records(V1_MAPPING.as_bytes(), "layer mapping").unwrap()
}

/// Single-sublayer layers only, so every request has a census row
const SIMPLE_LAYERS: &[&str] = &["L1", "L23", "L4A", "L4B", "L5", "L6"];

fn census(densities: &[(f64, f64)]) -> Vec<CensusRecord> {
    SIMPLE_LAYERS
        .iter()
        .zip(densities)
        .map(|(layer, (density, inhibitory))| CensusRecord {
            layer: layer.to_string(),
            n_neurons_10e6: *density,
            percent_inhibitory: *inhibitory,
        })
        .collect()
}

fn empty_apical_map() -> ApicalDendriteMap {
    let raw = RawTable::from_rows([["layer", "PC1"]]);
    ApicalDendriteMap::new(KeyedTable::from_raw(raw, "layer", "apical").unwrap())
}

#[test]
fn test_two_layer_groups_follow_census_split() {
    let requested: Vec<String> = ["L1", "L23"].iter().map(|s| s.to_string()).collect();
    let ontology = LayerOntology::map(&requested, &mapping()).unwrap();
    let census = census(&[(0.001, 10.0), (0.002, 20.0)]);
    let population = PopulationModel::build(&ontology, &census, 1.0).unwrap();

    let whole: BTreeMap<String, Vec<f64>> =
        requested.iter().map(|l| (l.clone(), vec![1.0])).collect();
    let excitatory = CellTypeProportions::resolve(
        Transmitter::Excitatory, &["SS".to_string()], &requested, &whole, None,
    ).unwrap();
    let inhibitory = CellTypeProportions::resolve(
        Transmitter::Inhibitory, &["BC".to_string()], &requested, &whole, None,
    ).unwrap();

    let apical = empty_apical_map();
    let background = BackgroundConfig::default();
    let groups = GroupSynthesizer::new(
        &ontology, &population, &excitatory, &inhibitory, &apical, &background,
    )
    .synthesize(1)
    .unwrap();

    let summary: Vec<(usize, &str, u64)> = groups
        .iter()
        .map(|g| (g.idx, g.neuron_subtype.as_str(), g.number_of_neurons))
        .collect();
    assert_eq!(
        summary,
        [
            (1, "L1_SS", 900),
            (2, "L1_BC", 100),
            (3, "L23_SS", 1600),
            (4, "L23_BC", 400),
        ]
    );
    assert_eq!(groups[1].cell_type.transmitter, Transmitter::Inhibitory);
}

proptest! {
    #[test]
    fn sublayers_map_to_one_requested_layer(
        requested in proptest::sample::subsequence(V1_LAYERS.to_vec(), 1..=V1_LAYERS.len()).prop_shuffle()
    ) {
        let requested: Vec<String> = requested.iter().map(|s| s.to_string()).collect();
        let ontology = LayerOntology::map(&requested, &mapping()).unwrap();

        let group_mappings = ontology.mappings(MappingScope::Groups);
        let mut seen = HashSet::new();
        for mapping in group_mappings {
            prop_assert!(seen.insert(mapping.csv_layer.clone()), "{} claimed twice", mapping.csv_layer);
        }

        let full: Vec<_> = ontology
            .mappings(MappingScope::Full)
            .iter()
            .map(|m| (m.layer.idx, m.csv_layer.clone()))
            .collect();
        for mapping in group_mappings {
            prop_assert!(full.contains(&(mapping.layer.idx, mapping.csv_layer.clone())));
        }

        let indices: Vec<usize> = ontology.layers().iter().map(|l| l.idx).collect();
        prop_assert_eq!(indices, (1..=requested.len()).collect::<Vec<_>>());
    }

    #[test]
    fn group_indices_are_contiguous(
        start_idx in 1usize..50,
        densities in proptest::collection::vec((0.0001f64..0.01, 0.0f64..100.0), SIMPLE_LAYERS.len()),
        excitatory_share in 0.0f64..=1.0,
    ) {
        let requested: Vec<String> = SIMPLE_LAYERS.iter().map(|s| s.to_string()).collect();
        let ontology = LayerOntology::map(&requested, &mapping()).unwrap();
        let population = PopulationModel::build(&ontology, &census(&densities), 0.01).unwrap();

        let manual = |shares: [f64; 2]| -> BTreeMap<String, Vec<f64>> {
            requested.iter().map(|l| (l.clone(), shares.to_vec())).collect()
        };
        let excitatory = CellTypeProportions::resolve(
            Transmitter::Excitatory,
            &["SS".to_string(), "SS2".to_string()],
            &requested,
            &manual([excitatory_share, 1.0 - excitatory_share]),
            None,
        ).unwrap();
        let inhibitory = CellTypeProportions::resolve(
            Transmitter::Inhibitory,
            &["BC".to_string(), "MC".to_string()],
            &requested,
            &manual([0.5, 0.5]),
            None,
        ).unwrap();

        let apical = empty_apical_map();
        let background = BackgroundConfig::default();
        let synthesizer = GroupSynthesizer::new(
            &ontology, &population, &excitatory, &inhibitory, &apical, &background,
        );
        let groups = synthesizer.synthesize(start_idx).unwrap();

        for (offset, group) in groups.iter().enumerate() {
            prop_assert_eq!(group.idx, start_idx + offset);
        }

        for layer in population.layers() {
            let pool = layer.excitatory_pool(population.area_proportion)
                + layer.inhibitory_pool(population.area_proportion);
            let prefix = format!("{}_", layer.layer.name);
            let assigned: u64 = groups
                .iter()
                .filter(|g| g.neuron_subtype.starts_with(&prefix))
                .map(|g| g.number_of_neurons)
                .sum();
            // each of up to four groups rounds by at most half a neuron
            prop_assert!((assigned as f64 - pool).abs() <= 2.0, "{} vs {}", assigned, pool);
        }

        let next = start_idx + groups.len();
        let table = GroupTable::new(None, groups).unwrap();
        prop_assert_eq!(table.next_idx(), next);
    }
}
