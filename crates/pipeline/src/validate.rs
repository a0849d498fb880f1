// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Load-time validation.
//!
//! A pipeline is checked once, before any AI call. Everything here is a
//! configuration error: the whole run fails with a single structured
//! error rather than per-item failures.

use crate::config::{PipelineConfig, ReduceSpec, SourceKind};
use crate::csv_source;
use crate::template;
use std::path::Path;
use thiserror::Error;

/// Errors from pipeline validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("pipeline name is required")]
    MissingName,
    #[error("input must set exactly one of items, from, generate (found {0})")]
    AmbiguousInput(usize),
    #[error("map.prompt is required")]
    EmptyMapPrompt,
    #[error("map.parallel must be at least 1")]
    InvalidParallel,
    #[error("map.timeoutMs must be greater than zero")]
    InvalidTimeout,
    #[error("parameter name {0:?} is not a valid identifier")]
    InvalidParameterName(String),
    #[error("duplicate parameter name {0:?}")]
    DuplicateParameter(String),
    #[error("reduce type \"text\" requires an empty map.output (text mode)")]
    TextReduceRequiresTextMode,
    #[error("reduce type \"ai\" requires a prompt")]
    AiReduceMissingPrompt,
    #[error("input item {index} is missing template variables: {}", vars.join(", "))]
    ItemMissingVariables { index: usize, vars: Vec<String> },
    #[error("CSV source requires a path")]
    CsvPathMissing,
    #[error(transparent)]
    Csv(#[from] csv_source::CsvError),
    #[error("CSV file {path} is missing columns required by the prompt: {}", columns.join(", "))]
    CsvMissingColumns { path: String, columns: Vec<String> },
    #[error("generate.prompt is required")]
    GenerateMissingPrompt,
    #[error("generate.schema must declare at least one field")]
    GenerateEmptySchema,
    #[error("generate.schema is missing fields required by the prompt: {}", fields.join(", "))]
    GenerateSchemaMissingVars { fields: Vec<String> },
}

/// Template variables the input must supply: everything in the map prompt
/// not covered by a parameter.
pub fn required_vars(config: &PipelineConfig) -> Vec<String> {
    template::extract_vars(&config.map.prompt)
        .into_iter()
        .filter(|var| !config.input.parameter_names().any(|p| p == var))
        .collect()
}

/// Validate a parsed pipeline against its package directory.
pub fn validate(config: &PipelineConfig, pipeline_dir: &Path) -> Result<(), ValidationError> {
    if config.name.trim().is_empty() {
        return Err(ValidationError::MissingName);
    }

    let sources = config.input.source_count();
    if sources != 1 {
        return Err(ValidationError::AmbiguousInput(sources));
    }

    if config.map.prompt.trim().is_empty() {
        return Err(ValidationError::EmptyMapPrompt);
    }
    if config.map.parallel < 1 {
        return Err(ValidationError::InvalidParallel);
    }
    if config.map.timeout_ms == 0 {
        return Err(ValidationError::InvalidTimeout);
    }

    let mut seen = Vec::new();
    for name in config.input.parameter_names() {
        if !is_identifier(name) {
            return Err(ValidationError::InvalidParameterName(name.to_string()));
        }
        if seen.contains(&name) {
            return Err(ValidationError::DuplicateParameter(name.to_string()));
        }
        seen.push(name);
    }

    match &config.reduce {
        ReduceSpec::Text { .. } if !config.map.is_text_mode() => {
            return Err(ValidationError::TextReduceRequiresTextMode);
        }
        ReduceSpec::Ai { prompt, .. } if prompt.trim().is_empty() => {
            return Err(ValidationError::AiReduceMissingPrompt);
        }
        _ => {}
    }

    let required = required_vars(config);

    if let Some(items) = &config.input.items {
        for (index, item) in items.iter().enumerate() {
            let missing: Vec<String> = required
                .iter()
                .filter(|var| !item.contains_key(var))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(ValidationError::ItemMissingVariables { index, vars: missing });
            }
        }
    }

    if let Some(from) = &config.input.from {
        let SourceKind::Csv = from.kind;
        if from.path.trim().is_empty() {
            return Err(ValidationError::CsvPathMissing);
        }
        let delimiter = from
            .delimiter
            .as_deref()
            .map(csv_source::parse_delimiter)
            .transpose()?;
        let path = csv_source::resolve_path(pipeline_dir, &from.path);
        let headers = csv_source::read_headers(&path, delimiter)?;
        let missing: Vec<String> = required
            .iter()
            .filter(|var| !headers.iter().any(|h| h == *var))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::CsvMissingColumns {
                path: path.display().to_string(),
                columns: missing,
            });
        }
    }

    if let Some(generate) = &config.input.generate {
        if generate.prompt.trim().is_empty() {
            return Err(ValidationError::GenerateMissingPrompt);
        }
        if generate.schema.is_empty() {
            return Err(ValidationError::GenerateEmptySchema);
        }
        let missing: Vec<String> = required
            .iter()
            .filter(|var| !generate.schema.iter().any(|f| f == *var))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::GenerateSchemaMissingVars { fields: missing });
        }
    }

    Ok(())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
