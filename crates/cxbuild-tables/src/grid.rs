// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Headerless string grids and key-indexed tables

use crate::reader::{open, TableFormat};
use crate::{TablesError, TablesResult};
use std::fs::File;
use std::io::{Read, Write};
use std::ops::Range;
use std::path::Path;

/// A headerless table of string cells; rows may differ in length
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn from_rows<I, R, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Read a headerless `.csv` file
    pub fn read_csv(path: &Path) -> TablesResult<Self> {
        let table = path.display().to_string();
        match TableFormat::from_path(path)? {
            TableFormat::Csv => Self::from_csv_reader(open(path)?, &table),
            TableFormat::Json => Err(TablesError::UnsupportedFormat {
                path: table,
                extension: "json".to_string(),
            }),
        }
    }

    pub fn from_csv_reader<R: Read>(reader: R, table: &str) -> TablesResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record.map_err(|source| TablesError::Csv {
                path: table.to_string(),
                source,
            })?;
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }
        Ok(Self { rows })
    }

    pub fn write_csv(&self, path: &Path) -> TablesResult<()> {
        let file = File::create(path).map_err(|source| TablesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.to_csv_writer(file, &path.display().to_string())
    }

    /// Write all rows padded to the table width
    pub fn to_csv_writer<W: Write>(&self, writer: W, table: &str) -> TablesResult<()> {
        let width = self.width();
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(writer);
        let csv_err = |source: csv::Error| TablesError::Csv {
            path: table.to_string(),
            source,
        };
        for row in &self.rows {
            let padding = width.saturating_sub(row.len());
            let cells = row
                .iter()
                .map(String::as_str)
                .chain(std::iter::repeat("").take(padding));
            csv_writer.write_record(cells).map_err(csv_err)?;
        }
        csv_writer.flush().map_err(|source| TablesError::Io {
            path: table.to_string(),
            source,
        })
    }

    pub fn to_csv_string(&self) -> TablesResult<String> {
        let mut buffer = Vec::new();
        self.to_csv_writer(&mut buffer, "<memory>")?;
        String::from_utf8(buffer).map_err(|e| TablesError::Malformed {
            table: "<memory>".to_string(),
            message: e.to_string(),
        })
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Widest row length
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Trimmed cell text; missing cells read as empty
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|c| c.trim())
            .unwrap_or("")
    }

    pub fn position<P>(&self, mut predicate: P) -> Option<usize>
    where
        P: FnMut(&[String]) -> bool,
    {
        self.rows.iter().position(|row| predicate(row))
    }

    pub fn is_blank_row(row: &[String]) -> bool {
        row.iter().all(|cell| cell.trim().is_empty())
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn extend<I: IntoIterator<Item = Vec<String>>>(&mut self, rows: I) {
        self.rows.extend(rows);
    }

    /// Replace `range` with `replacement`
    pub fn splice(&mut self, range: Range<usize>, replacement: Vec<Vec<String>>) {
        self.rows.splice(range, replacement);
    }

    /// Copy of the first `end` rows
    pub fn head(&self, end: usize) -> RawTable {
        RawTable::new(self.rows[..end.min(self.rows.len())].to_vec())
    }
}

/// A headered table indexed by one key column, e.g. the area statistics
/// (`stat` -> per-area values) or apical dendrite extents (`layer` -> per-type
/// extent strings)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedTable {
    name: String,
    header: Vec<String>,
    key_index: usize,
    rows: Vec<Vec<String>>,
}

impl KeyedTable {
    pub fn read_csv(path: &Path, key_column: &str) -> TablesResult<Self> {
        let raw = RawTable::read_csv(path)?;
        Self::from_raw(raw, key_column, &path.display().to_string())
    }

    /// First row is the header; the remaining non-blank rows are data
    pub fn from_raw(raw: RawTable, key_column: &str, name: &str) -> TablesResult<Self> {
        let mut rows = raw.into_rows().into_iter();
        let header: Vec<String> = rows
            .next()
            .ok_or_else(|| TablesError::Malformed {
                table: name.to_string(),
                message: "empty table".to_string(),
            })?
            .into_iter()
            .map(|c| c.trim().to_string())
            .collect();
        let key_index = header
            .iter()
            .position(|c| c == key_column)
            .ok_or_else(|| TablesError::MissingColumn {
                table: name.to_string(),
                column: key_column.to_string(),
            })?;
        Ok(Self {
            name: name.to_string(),
            header,
            key_index,
            rows: rows.filter(|row| !RawTable::is_blank_row(row)).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.header
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.header.iter().any(|c| c == column)
    }

    pub fn has_row(&self, key: &str) -> bool {
        self.row(key).is_some()
    }

    pub fn row_keys(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |row| row.get(self.key_index).map(|c| c.trim()).unwrap_or(""))
    }

    fn row(&self, key: &str) -> Option<&Vec<String>> {
        self.rows
            .iter()
            .find(|row| row.get(self.key_index).map(|c| c.trim()) == Some(key))
    }

    /// Non-empty cell at (`key`, `column`)
    pub fn get(&self, key: &str, column: &str) -> Option<&str> {
        let column_index = self.header.iter().position(|c| c == column)?;
        self.row(key)?
            .get(column_index)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }

    pub fn get_f64(&self, key: &str, column: &str) -> TablesResult<Option<f64>> {
        match self.get(key, column) {
            None => Ok(None),
            Some(text) => text.parse::<f64>().map(Some).map_err(|_| TablesError::Malformed {
                table: self.name.clone(),
                message: format!("cell ({}, {}) is not a number: '{}'", key, column, text),
            }),
        }
    }
}
