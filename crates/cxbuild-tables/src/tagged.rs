// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Row-tagged sections of the anatomy configuration table
//!
//! A section is every row whose first cell equals the tag. Its column names
//! are the row immediately before the first tagged row.

use crate::grid::RawTable;
use crate::{TablesError, TablesResult};

/// Column names of one tagged section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLayout {
    header: Vec<String>,
}

impl SectionLayout {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header: header.into_iter().map(|c| c.trim().to_string()).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.header
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.header.iter().position(|c| c == column)
    }

    /// Trimmed, non-empty value of `column` in `row`
    pub fn get<'r>(&self, row: &'r [String], column: &str) -> Option<&'r str> {
        row.get(self.position(column)?)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }

    pub fn require<'r>(&self, row: &'r [String], column: &str, table: &str) -> TablesResult<&'r str> {
        if self.position(column).is_none() {
            return Err(TablesError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
        self.get(row, column).ok_or_else(|| TablesError::Malformed {
            table: table.to_string(),
            message: format!("empty '{}' in row starting '{}'", column, row.join(",")),
        })
    }

    /// Row tagged `tag`, with `values` placed under their column names
    ///
    /// Values for columns the header lacks are dropped; unset columns stay empty.
    pub fn build_row(&self, tag: &str, values: &[(&str, String)]) -> Vec<String> {
        let mut row = vec![String::new(); self.header.len().max(1)];
        row[0] = tag.to_string();
        for (column, value) in values {
            if let Some(position) = self.position(column) {
                row[position] = value.clone();
            }
        }
        row
    }
}

/// Location of one tagged section inside a [`RawTable`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedSection {
    pub tag: String,
    pub layout: SectionLayout,
    rows: Vec<usize>,
}

impl TaggedSection {
    /// Find the rows tagged `tag`; `Ok(None)` when there are none
    ///
    /// # Errors
    /// A tagged first row has no header above it.
    pub fn locate(table: &RawTable, tag: &str) -> TablesResult<Option<Self>> {
        let rows: Vec<usize> = table
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| row.first().map(|c| c.trim()) == Some(tag))
            .map(|(index, _)| index)
            .collect();

        let Some(&first) = rows.first() else {
            return Ok(None);
        };
        if first == 0 {
            return Err(TablesError::Malformed {
                table: "anatomy".to_string(),
                message: format!("section '{}' starts on the first row, no header", tag),
            });
        }

        Ok(Some(Self {
            tag: tag.to_string(),
            layout: SectionLayout::new(table.rows()[first - 1].clone()),
            rows,
        }))
    }

    /// Index of the first tagged row
    pub fn first(&self) -> usize {
        self.rows[0]
    }

    /// Index one past the last tagged row
    pub fn end(&self) -> usize {
        self.rows[self.rows.len() - 1] + 1
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records<'a>(&'a self, table: &'a RawTable) -> impl Iterator<Item = &'a [String]> + 'a {
        self.rows.iter().map(move |&index| table.rows()[index].as_slice())
    }
}
