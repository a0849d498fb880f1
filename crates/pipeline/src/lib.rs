// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fanout-pipeline: the declarative pipeline definition.
//!
//! Parses `pipeline.yaml` into a typed, validated [`PipelineConfig`],
//! renders `{{var}}` prompt templates, extracts JSON objects from model
//! replies, and reads CSV input sources.

pub mod config;
pub mod csv_source;
pub mod response;
pub mod template;
pub mod validate;

pub use config::{
    FromSpec, GenerateSpec, InputSpec, MapSpec, Parameter, ParseError, PipelineConfig, ReduceSpec,
    SourceKind,
};
pub use response::{parse_output, ResponseParseError};
pub use template::{extract_vars, render, unresolved_vars, TemplateError};
pub use validate::{validate, ValidationError};
