// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work-item producers.
//!
//! A splitter yields a finite sequence of items from one of four sources:
//! inline entries, a CSV file, an externally-approved list, or an
//! AI-generated seed. The last one never produces items here: the engine
//! refuses to run a generated input without an approved list, and the
//! approval flow happens outside the core.

use fanout_core::PipelineItem;
use fanout_pipeline::csv_source;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from item production
#[derive(Debug, Error)]
pub enum SplitError {
    #[error(transparent)]
    Csv(#[from] csv_source::CsvError),
    #[error("generate input requires an externally approved item list")]
    GenerateRequiresItems,
}

enum Source {
    Inline(Vec<PipelineItem>),
    Csv { path: PathBuf, delimiter: Option<u8> },
    Generate { prompt: String, schema: Vec<String> },
    /// Externally supplied (approved generate list, or a host bypassing
    /// the splitter entirely).
    Provided(Vec<PipelineItem>),
}

/// Produces the job's items, applying the limit and merging parameter
/// defaults into each one.
pub struct Splitter {
    source: Source,
    parameters: Vec<(String, String)>,
    limit: Option<usize>,
}

impl Splitter {
    pub fn inline(items: Vec<PipelineItem>) -> Self {
        Self::from_source(Source::Inline(items))
    }

    pub fn csv(path: impl Into<PathBuf>, delimiter: Option<u8>) -> Self {
        Self::from_source(Source::Csv { path: path.into(), delimiter })
    }

    pub fn generate(prompt: impl Into<String>, schema: Vec<String>) -> Self {
        Self::from_source(Source::Generate { prompt: prompt.into(), schema })
    }

    pub fn provided(items: Vec<PipelineItem>) -> Self {
        Self::from_source(Source::Provided(items))
    }

    fn from_source(source: Source) -> Self {
        Self { source, parameters: Vec::new(), limit: None }
    }

    /// Name/value defaults merged into every item (item fields win).
    pub fn with_parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.parameters = parameters
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Materialize the item sequence.
    pub fn split(&self) -> Result<Vec<PipelineItem>, SplitError> {
        let raw = match &self.source {
            Source::Inline(items) | Source::Provided(items) => items.clone(),
            Source::Csv { path, delimiter } => csv_source::read_items(path, *delimiter)?,
            Source::Generate { .. } => return Err(SplitError::GenerateRequiresItems),
        };

        let capped: Vec<PipelineItem> = match self.limit {
            Some(limit) => raw.into_iter().take(limit).collect(),
            None => raw,
        };

        Ok(capped
            .into_iter()
            .map(|item| {
                item.merged_with_defaults(
                    self.parameters.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                )
            })
            .collect())
    }

    /// The prompt a collaborator sends to generate candidate items for
    /// approval: the seed prompt plus a schema-constrained JSON-array
    /// instruction.
    pub fn generation_prompt(&self) -> Option<String> {
        let Source::Generate { prompt, schema } = &self.source else {
            return None;
        };
        let fields = schema
            .iter()
            .map(|f| format!("\"{f}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let count = match self.limit {
            Some(limit) => format!("at most {limit} "),
            None => String::new(),
        };
        Some(format!(
            "{prompt}\n\nReturn a JSON array of {count}objects. Each object must have \
             exactly these fields: {fields}. Return only the JSON array."
        ))
    }
}

#[cfg(test)]
#[path = "splitter_tests.rs"]
mod tests;
