// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed pipeline definition, parsed from YAML.
//!
//! A pipeline is a single map plus a single reduce over one input source.
//! The config is immutable after parse; validation lives in
//! [`crate::validate`]. Unknown top-level keys are ignored so a pipeline
//! package file can also carry a `schedule:` block owned by the scheduler.

use fanout_core::PipelineItem;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from reading the YAML itself (shape errors, not semantic ones).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid pipeline YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A complete pipeline definition: input → map → reduce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub input: InputSpec,
    pub map: MapSpec,
    pub reduce: ReduceSpec,
}

impl PipelineConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ParseError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml(&self) -> Result<String, ParseError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Where items come from. Exactly one of `items`, `from`, `generate`
/// must be set (enforced by validation).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<PipelineItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<FromSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate: Option<GenerateSpec>,
    /// Name/value defaults merged into every item (item fields win).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    /// Cap on the number of items, applied after production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl InputSpec {
    /// How many of the mutually-exclusive sources are set.
    pub fn source_count(&self) -> usize {
        [self.items.is_some(), self.from.is_some(), self.generate.is_some()]
            .iter()
            .filter(|set| **set)
            .count()
    }

    /// Parameter names covered by this input.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }

    /// Parameter pairs for merging into items.
    pub fn parameter_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parameters.iter().map(|p| (p.name.as_str(), p.value.as_str()))
    }
}

/// External file source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromSpec {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Csv,
}

/// AI-generated input: a seed prompt plus the field names each generated
/// record must carry. The engine refuses to run this without an
/// externally-approved item list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateSpec {
    pub prompt: String,
    pub schema: Vec<String>,
}

/// One name/value default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

fn default_parallel() -> usize {
    5
}

fn default_timeout_ms() -> u64 {
    600_000
}

/// The per-item AI step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSpec {
    /// Prompt template; `{{var}}` placeholders resolve against the merged item.
    pub prompt: String,
    /// Declared JSON output fields. Empty enables text mode: the raw
    /// response passes through unparsed.
    #[serde(default)]
    pub output: Vec<String>,
    #[serde(default = "default_parallel")]
    pub parallel: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(rename = "timeoutMs", default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl MapSpec {
    /// Text mode: no declared output fields, raw response carried as-is.
    pub fn is_text_mode(&self) -> bool {
        self.output.is_empty()
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

fn default_text_separator() -> String {
    "\n\n---\n\n".to_string()
}

fn is_default_text_separator(s: &str) -> bool {
    s == default_text_separator()
}

/// How map results are aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReduceSpec {
    /// Markdown: one section per item showing inputs and declared outputs.
    List,
    /// Markdown table; columns are the declared output fields.
    Table {
        /// Also render input columns before the output columns.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        inputs: bool,
    },
    /// Structured `{ results: [...] }`.
    Json,
    /// Concatenated raw responses; only valid for text-mode maps.
    Text {
        #[serde(default = "default_text_separator", skip_serializing_if = "is_default_text_separator")]
        separator: String,
    },
    /// A second AI call over the collected results.
    Ai {
        #[serde(default)]
        prompt: String,
        #[serde(default)]
        output: Vec<String>,
    },
}

impl ReduceSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ReduceSpec::List => "list",
            ReduceSpec::Table { .. } => "table",
            ReduceSpec::Json => "json",
            ReduceSpec::Text { .. } => "text",
            ReduceSpec::Ai { .. } => "ai",
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
