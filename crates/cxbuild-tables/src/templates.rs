// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Neuron ephys template table
//!
//! Layout (headerless grid):
//!
//! ```text
//! Key,SS,BC,MC,...            <- point neuron header
//! C,100*pF,...                <- point neuron parameters
//!
//! CompartmentalNeurons
//! Key,PC,...                  <- compartmental header
//! fract_areas,...             <- compartmental parameters
//! ```

use crate::grid::RawTable;
use crate::{TablesError, TablesResult};

const COMPARTMENTAL_MARKER: &str = "CompartmentalNeurons";
const TABLE: &str = "ephys templates";

/// Key column plus one value column per neuron type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    keys: Vec<String>,
    columns: Vec<String>,
    /// `values[row][column]`
    values: Vec<Vec<String>>,
}

impl ParameterSet {
    fn from_rows(header: &[String], rows: &[Vec<String>]) -> TablesResult<Self> {
        let first = header.first().map(|c| c.trim()).unwrap_or("");
        if first != "Key" {
            return Err(TablesError::MissingColumn {
                table: TABLE.to_string(),
                column: "Key".to_string(),
            });
        }
        let mut columns: Vec<String> = header[1..].iter().map(|c| c.trim().to_string()).collect();
        while columns.last().is_some_and(|c| c.is_empty()) {
            columns.pop();
        }

        let mut keys = Vec::new();
        let mut values = Vec::new();
        for row in rows.iter().filter(|row| !RawTable::is_blank_row(row)) {
            keys.push(row[0].trim().to_string());
            values.push(
                (1..=columns.len())
                    .map(|i| row.get(i).map(|c| c.trim().to_string()).unwrap_or_default())
                    .collect(),
            );
        }
        Ok(Self { keys, columns, values })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn neuron_types(&self) -> &[String] {
        &self.columns
    }

    pub fn has_type(&self, neuron_type: &str) -> bool {
        self.columns.iter().any(|c| c == neuron_type)
    }

    /// `(key, value)` pairs for one neuron type, in table order
    pub fn column(&self, neuron_type: &str) -> Option<Vec<(String, String)>> {
        let index = self.columns.iter().position(|c| c == neuron_type)?;
        Some(
            self.keys
                .iter()
                .zip(&self.values)
                .map(|(key, row)| (key.clone(), row[index].clone()))
                .collect(),
        )
    }
}

/// Point-neuron and compartmental-neuron parameter templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphysTemplates {
    pub point: ParameterSet,
    pub compartmental: ParameterSet,
}

impl EphysTemplates {
    pub fn read_csv(path: &std::path::Path) -> TablesResult<Self> {
        Self::from_raw(&RawTable::read_csv(path)?)
    }

    pub fn from_raw(table: &RawTable) -> TablesResult<Self> {
        let rows = table.rows();
        let marker = table
            .position(|row| row.first().map(|c| c.trim()) == Some(COMPARTMENTAL_MARKER))
            .ok_or_else(|| TablesError::Malformed {
                table: TABLE.to_string(),
                message: format!("no '{}' section marker", COMPARTMENTAL_MARKER),
            })?;
        if marker == 0 || marker + 1 >= rows.len() {
            return Err(TablesError::Malformed {
                table: TABLE.to_string(),
                message: "point and compartmental sections both need a header row".to_string(),
            });
        }

        let point = ParameterSet::from_rows(&rows[0], &rows[1..marker])?;
        let compartmental = ParameterSet::from_rows(&rows[marker + 1], &rows[marker + 2..])?;
        Ok(Self { point, compartmental })
    }
}
