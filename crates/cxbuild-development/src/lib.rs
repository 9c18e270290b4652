// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# cxbuild Development

Builds the neuron groups and synapses of one layered cortical area:

- Layer ontology mapping (requested layers ↔ survey sublayers ↔ census layers)
- Per-layer neuron populations scaled to the simulated visual-field patch
- Neuron group synthesis per layer and cell type, with pyramidal apical extents
- Connection normalization from qualitative survey strengths
- Synapse resolution down to pyramidal compartments

## Pipeline

```text
layer mapping -> population -> groups -> connections -> synapses -> physiology -> export
```

[`BuildSession`] runs the stages on a [`BuildInputs`] snapshot and returns
the extended anatomy and physiology tables.

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod anatomy;
pub mod cell_types;
pub mod compartments;
pub mod connections;
pub mod groups;
pub mod inputs;
pub mod layers;
pub mod physiology;
pub mod population;
pub mod session;
pub mod synapses;
pub mod types;

pub use types::{BuildError, BuildResult, ConfigurationError, GroupIdx, LayerIdx};

pub use layers::{LayerMapping, LayerOntology, LayerSpec, MappingScope};

pub use cell_types::{
    CellClass, CellType, CellTypeCensus, CellTypeDataSource, CellTypeProportions, Transmitter,
};

pub use population::{area_proportion, AreaGeometry, LayerPopulation, PopulationModel};

pub use compartments::{ApicalDendriteMap, ApicalExtent, CompartmentCategory, CompartmentalParameters};

pub use groups::{
    BackgroundInputs, GroupSynthesizer, GroupTable, LayerPlacement, NeuronGroup, INPUT_GROUP_IDX,
    INPUT_LAYER_IDX,
};

pub use connections::{ConnectionNormalizer, LayerConnection, Strength};

pub use synapses::{
    CompartmentRules, ContactPermissions, PostTarget, Receptor, SomaSites, Synapse,
    SynapseResolver, SynapseSettings, SynapseTable,
};

pub use physiology::{InputStub, ParameterBlock, PhysiologyTable, GROUP_PARAMETERS_MARKER};

pub use anatomy::{AnatomyTable, MergeMode, RowDefaults};

pub use inputs::BuildInputs;

pub use session::{BuildContext, BuildOutput, BuildProgress, BuildSession, BuildStage};
