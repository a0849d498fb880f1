// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CSV input source.
//!
//! Paths resolve against the pipeline's package directory, never the
//! process CWD, so a package can reference `./data.csv`, nested files,
//! or a sibling `../shared/items.csv`.

use fanout_core::{FieldValue, PipelineItem};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from CSV reading
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("cannot read CSV file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("CSV delimiter must be a single character, got {0:?}")]
    BadDelimiter(String),
}

/// Resolve a config path against the pipeline package directory.
pub fn resolve_path(pipeline_dir: &Path, raw: &str) -> PathBuf {
    let raw_path = Path::new(raw);
    if raw_path.is_absolute() {
        raw_path.to_path_buf()
    } else {
        pipeline_dir.join(raw_path)
    }
}

/// Parse the optional delimiter override. Accepts a single character or
/// the escape `\t`.
pub fn parse_delimiter(raw: &str) -> Result<u8, CsvError> {
    if raw == "\\t" || raw == "\t" {
        return Ok(b'\t');
    }
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c as u8),
        _ => Err(CsvError::BadDelimiter(raw.to_string())),
    }
}

fn reader(path: &Path, delimiter: Option<u8>) -> Result<csv::Reader<std::fs::File>, CsvError> {
    let mut builder = csv::ReaderBuilder::new();
    builder.trim(csv::Trim::All);
    if let Some(d) = delimiter {
        builder.delimiter(d);
    }
    builder.from_path(path).map_err(|e| {
        if matches!(e.kind(), csv::ErrorKind::Io(_)) {
            match e.into_kind() {
                csv::ErrorKind::Io(source) => {
                    CsvError::Unreadable { path: path.to_path_buf(), source }
                }
                _ => unreachable!("kind checked above"),
            }
        } else {
            CsvError::Malformed { path: path.to_path_buf(), source: e }
        }
    })
}

/// Read just the header row, for load-time validation.
pub fn read_headers(path: &Path, delimiter: Option<u8>) -> Result<Vec<String>, CsvError> {
    let mut rdr = reader(path, delimiter)?;
    let headers = rdr
        .headers()
        .map_err(|e| CsvError::Malformed { path: path.to_path_buf(), source: e })?;
    Ok(headers.iter().map(str::to_string).collect())
}

/// Read every row as one [`PipelineItem`], headers as keys, cells
/// sniffed into the narrowest scalar.
pub fn read_items(path: &Path, delimiter: Option<u8>) -> Result<Vec<PipelineItem>, CsvError> {
    let mut rdr = reader(path, delimiter)?;
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| CsvError::Malformed { path: path.to_path_buf(), source: e })?
        .iter()
        .map(str::to_string)
        .collect();

    let mut items = Vec::new();
    for record in rdr.records() {
        let record =
            record.map_err(|e| CsvError::Malformed { path: path.to_path_buf(), source: e })?;
        let mut item = PipelineItem::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            item.insert(header.as_str(), FieldValue::sniff(cell));
        }
        items.push(item);
    }
    tracing::debug!(path = %path.display(), rows = items.len(), "read CSV source");
    Ok(items)
}

#[cfg(test)]
#[path = "csv_source_tests.rs"]
mod tests;
