// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Build session - one pass from reference tables to extended anatomy and
physiology tables.

Stages run in a fixed order:

1. **Layer mapping**: requested layers against the layer mapping table
2. **Population**: area proportion and per-layer neuron pools
3. **Group synthesis**: cell type proportions and neuron groups
4. **Connection normalization**: survey rows to layer-pair probabilities
5. **Synapse resolution**: layer pairs to group-level synapse rows
6. **Physiology**: per-subtype parameter blocks
7. **Export**: groups and synapses merged into the anatomy table

Whether the build has an input group is decided once, from the physiology
table, and carried in the [`BuildContext`].
*/

use crate::anatomy::{AnatomyTable, MergeMode, RowDefaults};
use crate::cell_types::{CellTypeProportions, Transmitter};
use crate::connections::{ConnectionNormalizer, LayerConnection};
use crate::groups::{GroupSynthesizer, GroupTable, NeuronGroup, INPUT_LAYER_IDX};
use crate::inputs::BuildInputs;
use crate::layers::LayerOntology;
use crate::physiology::{InputStub, PhysiologyTable};
use crate::population::{area_proportion, PopulationModel};
use crate::synapses::{CompartmentRules, ContactPermissions, SynapseResolver, SynapseSettings, SynapseTable};
use crate::types::{BuildError, BuildResult, ConfigurationError};
use cxbuild_config::CxBuildConfig;
use cxbuild_tables::RawTable;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};

/// Build stage tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    /// Not started
    Initialization,
    /// Requested layers against the layer mapping table
    LayerMapping,
    /// Neuron pools per layer
    Population,
    /// Neuron groups
    GroupSynthesis,
    /// Layer-pair probabilities
    ConnectionNormalization,
    /// Synapse rows
    SynapseResolution,
    /// Subtype parameter blocks
    Physiology,
    /// Anatomy merge
    Export,
    /// Build completed successfully
    Completed,
    /// Build failed
    Failed,
}

/// Build progress information
#[derive(Debug, Clone)]
pub struct BuildProgress {
    /// Current stage
    pub stage: BuildStage,
    /// Progress percentage within current stage (0-100)
    pub progress: u8,
    pub layers_mapped: usize,
    pub groups_created: usize,
    pub neurons_created: u64,
    pub layer_connections: usize,
    pub synapses_created: usize,
    /// Duration of the build in milliseconds
    pub duration_ms: u64,
}

impl Default for BuildProgress {
    fn default() -> Self {
        Self {
            stage: BuildStage::Initialization,
            progress: 0,
            layers_mapped: 0,
            groups_created: 0,
            neurons_created: 0,
            layer_connections: 0,
            synapses_created: 0,
            duration_ms: 0,
        }
    }
}

/// Facts about the build decided from its inputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildContext {
    /// Input group announced by the physiology table
    pub input_stub: Option<InputStub>,
}

impl BuildContext {
    pub fn has_input_group(&self) -> bool {
        self.input_stub.is_some()
    }
}

/// Result of a completed build
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub anatomy: RawTable,
    pub physiology: RawTable,
    pub groups: GroupTable,
    pub synapses: SynapseTable,
    pub context: BuildContext,
}

impl BuildOutput {
    /// Write `<anatomy>_cxc.csv` and `<physiology>_cxc.csv` next to the inputs
    ///
    /// Returns the anatomy and physiology output paths.
    pub fn write(&self, config: &CxBuildConfig) -> BuildResult<(PathBuf, PathBuf)> {
        let paths = &config.paths;
        let anatomy_path = paths.output_file(&paths.anatomy_file);
        let physiology_path = paths.output_file(&paths.physiology_file);
        self.anatomy.write_csv(&anatomy_path)?;
        self.physiology.write_csv(&physiology_path)?;
        info!(target: "cxbuild-development",
            "💾 Wrote {} and {}", anatomy_path.display(), physiology_path.display());
        Ok((anatomy_path, physiology_path))
    }
}

/// Build session orchestrator
pub struct BuildSession {
    config: CxBuildConfig,
    progress: BuildProgress,
    /// Start time for duration tracking
    start_time: Instant,
}

impl BuildSession {
    pub fn new(config: CxBuildConfig) -> Self {
        Self {
            config,
            progress: BuildProgress::default(),
            start_time: Instant::now(),
        }
    }

    pub fn config(&self) -> &CxBuildConfig {
        &self.config
    }

    /// Get current build progress
    pub fn progress(&self) -> &BuildProgress {
        &self.progress
    }

    /// Run every stage on `inputs`
    ///
    /// A failure leaves the session in [`BuildStage::Failed`].
    pub fn run(&mut self, inputs: &BuildInputs) -> BuildResult<BuildOutput> {
        self.start_time = Instant::now();
        info!(target: "cxbuild-development",
            "🧬 Building {} circuit for layers {:?}",
            self.config.area.name, self.config.layers.requested);

        match self.run_stages(inputs) {
            Ok(output) => {
                self.update_stage(BuildStage::Completed, 100);
                info!(target: "cxbuild-development",
                    "✅ Build completed in {}ms: {} groups, {} neurons, {} synapse rows",
                    self.progress.duration_ms, self.progress.groups_created,
                    self.progress.neurons_created, self.progress.synapses_created);
                Ok(output)
            }
            Err(e) => {
                let failed_at = self.progress.stage;
                self.update_stage(BuildStage::Failed, 0);
                error!(target: "cxbuild-development", "❌ Build failed during {:?}: {}", failed_at, e);
                Err(e)
            }
        }
    }

    fn run_stages(&mut self, inputs: &BuildInputs) -> BuildResult<BuildOutput> {
        let config = self.config.clone();

        // Stage 1: layer mapping
        self.update_stage(BuildStage::LayerMapping, 0);
        let ontology = LayerOntology::map(&config.layers.requested, &inputs.layer_mapping)?;
        self.progress.layers_mapped = ontology.layers().len();

        // Stage 2: populations
        self.update_stage(BuildStage::Population, 0);
        let proportion = area_proportion(&config.area, &inputs.area_stats)?;
        let population = PopulationModel::build(&ontology, &inputs.census, proportion)?;

        // Stage 3: groups
        self.update_stage(BuildStage::GroupSynthesis, 0);
        let physiology = PhysiologyTable::split(&inputs.physiology)?;
        let context = BuildContext {
            input_stub: physiology.input_stub().cloned(),
        };

        let layer_names = &config.layers.requested;
        let cell_types = &config.cell_types;
        let excitatory = CellTypeProportions::resolve(
            Transmitter::Excitatory,
            &cell_types.excitatory_types,
            layer_names,
            &cell_types.excitatory_proportions,
            inputs.cell_type_census.as_ref(),
        )?;
        let inhibitory = CellTypeProportions::resolve(
            Transmitter::Inhibitory,
            &cell_types.inhibitory_types,
            layer_names,
            &cell_types.inhibitory_proportions,
            inputs.cell_type_census.as_ref(),
        )?;

        let mode = MergeMode::from_replace_flag(config.anatomy.replace_existing_groups);
        let mut anatomy = AnatomyTable::new(inputs.anatomy.clone());
        let mut kept = match mode {
            MergeMode::Replace => Vec::new(),
            MergeMode::Append => anatomy
                .parse_groups()?
                .into_iter()
                .map(|mut group| {
                    // Configured inhibitory types override the class read back from the table
                    if let Some(cell_type) = inhibitory.cell_type(&group.cell_type.name) {
                        group.cell_type = cell_type.clone();
                    }
                    group
                })
                .collect(),
        };
        let start_idx = anatomy.first_new_group_idx(mode)?;

        let synthesizer = GroupSynthesizer::new(
            &ontology,
            &population,
            &excitatory,
            &inhibitory,
            &inputs.apical_dendrites,
            &config.background,
        );
        let new_groups = synthesizer.synthesize(start_idx)?;
        self.progress.groups_created = new_groups.len();
        self.progress.neurons_created = new_groups.iter().map(|g| g.number_of_neurons).sum();
        kept.extend(new_groups.iter().cloned());

        let input_group = if context.has_input_group() {
            let first = excitatory.types().first().ok_or_else(|| {
                BuildError::data_shape("an input group needs at least one excitatory cell type")
            })?;
            Some(NeuronGroup::input(first.clone()))
        } else {
            None
        };
        let groups = GroupTable::new(input_group, kept)?;

        // Stage 4: connections
        self.update_stage(BuildStage::ConnectionNormalization, 0);
        let normalizer = ConnectionNormalizer::new(&ontology, config.connections.use_all_csv_data);
        let excitatory_connections = normalizer.normalize(&inputs.excitatory_connections, &config.area.name)?;
        let inhibitory_connections = normalizer.normalize(&inputs.inhibitory_connections, &config.area.name)?;
        self.progress.layer_connections = excitatory_connections.len() + inhibitory_connections.len();

        let input_connection = if context.has_input_group() {
            let target = ontology
                .index_of(&config.input.target_layer)
                .ok_or_else(|| ConfigurationError::InputTargetNotRequested(config.input.target_layer.clone()))?;
            Some(LayerConnection {
                source: INPUT_LAYER_IDX,
                target,
                p: config.input.connection_probability,
            })
        } else {
            None
        };

        // Stage 5: synapses
        self.update_stage(BuildStage::SynapseResolution, 0);
        let permissions = ContactPermissions::from_records(&inputs.contact_permissions)?;
        let compartment_rules = CompartmentRules::from_records(&inputs.compartment_rules)?;
        let resolver = SynapseResolver::new(
            &ontology,
            &excitatory,
            &inhibitory,
            &permissions,
            &compartment_rules,
            SynapseSettings::from_config(&config.connections),
        );
        let synapses = resolver.resolve(
            &groups,
            &excitatory_connections,
            &inhibitory_connections,
            input_connection.as_ref(),
        )?;
        synapses.check_references(&groups)?;
        self.progress.synapses_created = synapses.len();

        // Stage 6: physiology
        self.update_stage(BuildStage::Physiology, 0);
        let physiology = physiology.with_groups(&groups, &inputs.ephys_templates)?;

        // Stage 7: export
        self.update_stage(BuildStage::Export, 0);
        let defaults = RowDefaults {
            group_monitors: config.background.monitors.clone(),
            synapse_type: config.connections.synapse_type.clone(),
        };
        anatomy.merge_groups(&new_groups, &defaults, mode)?;
        anatomy.merge_synapses(&synapses, &defaults, mode)?;

        Ok(BuildOutput {
            anatomy: anatomy.into_raw(),
            physiology,
            groups,
            synapses,
            context,
        })
    }

    fn update_stage(&mut self, stage: BuildStage, progress: u8) {
        self.progress.stage = stage;
        self.progress.progress = progress;
        self.progress.duration_ms = self.start_time.elapsed().as_millis() as u64;
        debug!(target: "cxbuild-development", "   Stage {:?} at {}ms", stage, self.progress.duration_ms);
    }
}
