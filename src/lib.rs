// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # cxbuild - cortical circuit configuration builder
//!
//! Builds the neuron groups and synapses of one layered cortical area from
//! anatomical survey tables, and writes them into an existing pair of
//! anatomy/physiology configuration tables.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cxbuild::prelude::*;
//!
//! let config = load_config(None, None)?;
//! let inputs = BuildInputs::load(&config)?;
//!
//! let mut session = BuildSession::new(config.clone());
//! let output = session.run(&inputs)?;
//! let (anatomy, physiology) = output.write(&config)?;
//! println!("{} groups -> {}", output.groups.len(), anatomy.display());
//! # let _ = physiology;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: cxbuild-config, cxbuild-observability      │
//! │  (TOML configuration, logging setup)                    │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Data: cxbuild-tables                                   │
//! │  (CSV/JSON records, row-tagged anatomy tables)          │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Algorithms: cxbuild-development                        │
//! │  (layers, populations, groups, connections, synapses)   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

pub use cxbuild_config as config;
pub use cxbuild_development as development;
pub use cxbuild_observability as observability;
pub use cxbuild_tables as tables;

/// Prelude - commonly used types and functions
pub mod prelude {
    pub use crate::config::{load_config, validate_config, CxBuildConfig};
    pub use crate::development::{
        BuildError, BuildInputs, BuildOutput, BuildResult, BuildSession, BuildStage,
        ConfigurationError, GroupTable, LayerOntology, NeuronGroup, Synapse, SynapseTable,
    };
    pub use crate::tables::{KeyedTable, RawTable};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let config = CxBuildConfig::default();
        let session = BuildSession::new(config);
        assert_eq!(session.progress().stage, BuildStage::Initialization);
    }
}
