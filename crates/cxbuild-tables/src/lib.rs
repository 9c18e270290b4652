// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Tabular I/O boundary for the cortical circuit builder.

Two kinds of tables cross this boundary:

- **Reference tables** with a header row (layer mapping, census, connection
  strengths, contact rules). They are read into typed serde records with
  [`read_records`], from `.csv` or `.json` (array of objects).
- **Configuration tables** without a header (anatomy, physiology, ephys
  templates). They are read into a [`RawTable`] grid of strings. Anatomy rows
  are tagged by their first cell (`G` for neuron groups, `S` for synapses);
  [`TaggedSection`] locates a tagged section and its column header.

Nothing outside this crate parses or renders CSV text.
*/

pub mod grid;
pub mod reader;
pub mod records;
pub mod tagged;
pub mod templates;

pub use grid::{KeyedTable, RawTable};
pub use reader::{read_records, TableFormat};
pub use records::*;
pub use tagged::{SectionLayout, TaggedSection};
pub use templates::{EphysTemplates, ParameterSet};

/// Errors raised while reading or interpreting tables
#[derive(Debug, thiserror::Error)]
pub enum TablesError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported table format '{extension}' for {path} (expected .csv or .json)")]
    UnsupportedFormat { path: String, extension: String },

    #[error("Table {table} has no column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Table {table} has no row '{row}'")]
    MissingRow { table: String, row: String },

    #[error("Table {table}: {message}")]
    Malformed { table: String, message: String },
}

/// Result type for table operations
pub type TablesResult<T> = Result<T, TablesError>;

/// Split a comma-joined cell into trimmed, non-empty items
///
/// `"PC, BC,MC"` becomes `["PC", "BC", "MC"]`.
pub fn split_list(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(|item| item.replace(' ', ""))
        .filter(|item| !item.is_empty())
        .collect()
}

/// Render a float the way the downstream simulator configs expect
///
/// Shortest round-trip digits, with integral values keeping a trailing `.0`.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}
