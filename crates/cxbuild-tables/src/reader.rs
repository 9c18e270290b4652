// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Typed record readers for headered reference tables

use crate::{TablesError, TablesResult};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Supported on-disk formats, selected by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Json,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> TablesResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match extension.as_str() {
            "csv" => Ok(TableFormat::Csv),
            "json" => Ok(TableFormat::Json),
            _ => Err(TablesError::UnsupportedFormat {
                path: path.display().to_string(),
                extension,
            }),
        }
    }
}

pub(crate) fn open(path: &Path) -> TablesResult<File> {
    File::open(path).map_err(|source| TablesError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Read every record of a `.csv` (header row) or `.json` (array of objects) table
pub fn read_records<T: DeserializeOwned>(path: &Path) -> TablesResult<Vec<T>> {
    let format = TableFormat::from_path(path)?;
    let table = path.display().to_string();
    let file = open(path)?;
    let records = match format {
        TableFormat::Csv => csv_records(file, &table)?,
        TableFormat::Json => json_document(file, &table)?,
    };
    debug!(target: "cxbuild-tables", "Read {} records from {}", records.len(), table);
    Ok(records)
}

/// Read a whole `.json` document into `T`
pub fn read_json<T: DeserializeOwned>(path: &Path) -> TablesResult<T> {
    let table = path.display().to_string();
    match TableFormat::from_path(path)? {
        TableFormat::Json => json_document(open(path)?, &table),
        TableFormat::Csv => Err(TablesError::UnsupportedFormat {
            path: table,
            extension: "csv".to_string(),
        }),
    }
}

/// Deserialize headered CSV rows; cells and headers are trimmed
pub fn csv_records<T: DeserializeOwned, R: Read>(reader: R, table: &str) -> TablesResult<Vec<T>> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize()
        .map(|record| {
            record.map_err(|source| TablesError::Csv {
                path: table.to_string(),
                source,
            })
        })
        .collect()
}

pub fn json_document<T: DeserializeOwned, R: Read>(reader: R, table: &str) -> TablesResult<T> {
    serde_json::from_reader(BufReader::new(reader)).map_err(|source| TablesError::Json {
        path: table.to_string(),
        source,
    })
}
