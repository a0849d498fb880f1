// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::PipelineConfig;
use std::io::Write;

fn parse(yaml: &str) -> PipelineConfig {
    PipelineConfig::from_yaml(yaml).unwrap()
}

fn check(yaml: &str) -> Result<(), ValidationError> {
    validate(&parse(yaml), Path::new("/nonexistent-package"))
}

const MINIMAL: &str = r#"
name: ok
input:
  items: [{title: x}]
map:
  prompt: "Analyze {{title}}"
  output: [severity]
reduce:
  type: list
"#;

#[test]
fn minimal_pipeline_is_valid() {
    assert!(check(MINIMAL).is_ok());
}

#[test]
fn blank_name_is_rejected() {
    let yaml = MINIMAL.replace("name: ok", "name: \"  \"");
    assert!(matches!(check(&yaml), Err(ValidationError::MissingName)));
}

#[test]
fn zero_or_two_sources_are_rejected() {
    let none = r#"
name: x
input: {}
map: {prompt: "p", output: []}
reduce: {type: text}
"#;
    assert!(matches!(check(none), Err(ValidationError::AmbiguousInput(0))));

    let both = r#"
name: x
input:
  items: [{title: a}]
  generate: {prompt: "g", schema: [title]}
map: {prompt: "p", output: []}
reduce: {type: text}
"#;
    assert!(matches!(check(both), Err(ValidationError::AmbiguousInput(2))));
}

#[test]
fn empty_map_prompt_is_rejected() {
    let yaml = r#"
name: x
input: {items: [{title: a}]}
map: {prompt: "  ", output: []}
reduce: {type: text}
"#;
    assert!(matches!(check(yaml), Err(ValidationError::EmptyMapPrompt)));
}

#[test]
fn zero_parallel_and_zero_timeout_are_rejected() {
    let parallel = r#"
name: x
input: {items: [{title: a}]}
map: {prompt: "p", output: [], parallel: 0}
reduce: {type: text}
"#;
    assert!(matches!(check(parallel), Err(ValidationError::InvalidParallel)));

    let timeout = r#"
name: x
input: {items: [{title: a}]}
map: {prompt: "p", output: [], timeoutMs: 0}
reduce: {type: text}
"#;
    assert!(matches!(check(timeout), Err(ValidationError::InvalidTimeout)));
}

#[test]
fn parameter_names_must_be_unique_identifiers() {
    let bad_name = r#"
name: x
input:
  items: [{title: a}]
  parameters: [{name: "not-ok", value: v}]
map: {prompt: "p", output: []}
reduce: {type: text}
"#;
    assert!(matches!(check(bad_name), Err(ValidationError::InvalidParameterName(_))));

    let duplicate = r#"
name: x
input:
  items: [{title: a}]
  parameters: [{name: env, value: a}, {name: env, value: b}]
map: {prompt: "p", output: []}
reduce: {type: text}
"#;
    assert!(matches!(check(duplicate), Err(ValidationError::DuplicateParameter(_))));
}

#[test]
fn text_reduce_requires_text_mode() {
    let yaml = r#"
name: x
input: {items: [{title: a}]}
map: {prompt: "{{title}}", output: [severity]}
reduce: {type: text}
"#;
    assert!(matches!(check(yaml), Err(ValidationError::TextReduceRequiresTextMode)));
}

#[test]
fn ai_reduce_requires_prompt() {
    let yaml = r#"
name: x
input: {items: [{title: a}]}
map: {prompt: "{{title}}", output: [severity]}
reduce: {type: ai}
"#;
    assert!(matches!(check(yaml), Err(ValidationError::AiReduceMissingPrompt)));
}

#[test]
fn inline_item_missing_variable_fails_up_front() {
    let yaml = r#"
name: x
input:
  items: [{title: a}, {other: b}]
map: {prompt: "Analyze {{title}}", output: []}
reduce: {type: text}
"#;
    match check(yaml) {
        Err(ValidationError::ItemMissingVariables { index, vars }) => {
            assert_eq!(index, 1);
            assert_eq!(vars, vec!["title"]);
        }
        other => panic!("expected ItemMissingVariables, got {:?}", other),
    }
}

#[test]
fn parameters_cover_prompt_variables() {
    let yaml = r#"
name: x
input:
  items: [{title: a}]
  parameters: [{name: env, value: prod}]
map: {prompt: "{{env}}: {{title}}", output: []}
reduce: {type: text}
"#;
    assert!(check(yaml).is_ok());
}

#[test]
fn csv_missing_file_is_a_validation_error() {
    let yaml = r#"
name: x
input:
  from: {type: csv, path: ./missing.csv}
map: {prompt: "{{title}}", output: []}
reduce: {type: text}
"#;
    assert!(matches!(check(yaml), Err(ValidationError::Csv(_))));
}

#[test]
fn csv_headers_must_cover_prompt_variables() {
    let tmp = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(tmp.path().join("data.csv")).unwrap();
    writeln!(file, "id,name").unwrap();
    writeln!(file, "1,A").unwrap();

    let yaml = r#"
name: x
input:
  from: {type: csv, path: ./data.csv}
map: {prompt: "Analyze {{title}}", output: []}
reduce: {type: text}
"#;
    match validate(&parse(yaml), tmp.path()) {
        Err(ValidationError::CsvMissingColumns { columns, .. }) => {
            assert_eq!(columns, vec!["title"]);
        }
        other => panic!("expected CsvMissingColumns, got {:?}", other),
    }
}

#[test]
fn csv_with_covering_headers_is_valid() {
    let tmp = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(tmp.path().join("data.csv")).unwrap();
    writeln!(file, "id,title").unwrap();
    writeln!(file, "1,A").unwrap();

    let yaml = r#"
name: x
input:
  from: {type: csv, path: ./data.csv}
map: {prompt: "Analyze {{title}}", output: []}
reduce: {type: text}
"#;
    assert!(validate(&parse(yaml), tmp.path()).is_ok());
}

#[test]
fn generate_schema_must_cover_prompt_variables() {
    let yaml = r#"
name: x
input:
  generate: {prompt: "make items", schema: [other]}
map: {prompt: "Analyze {{title}}", output: []}
reduce: {type: text}
"#;
    match check(yaml) {
        Err(ValidationError::GenerateSchemaMissingVars { fields }) => {
            assert_eq!(fields, vec!["title"]);
        }
        other => panic!("expected GenerateSchemaMissingVars, got {:?}", other),
    }
}

#[test]
fn generate_requires_prompt_and_schema() {
    let no_schema = r#"
name: x
input:
  generate: {prompt: "make items", schema: []}
map: {prompt: "p", output: []}
reduce: {type: text}
"#;
    assert!(matches!(check(no_schema), Err(ValidationError::GenerateEmptySchema)));
}

#[test]
fn required_vars_excludes_parameters() {
    let config = parse(
        r#"
name: x
input:
  items: [{title: a}]
  parameters: [{name: env, value: prod}]
map: {prompt: "{{env}} {{title}} {{region}}", output: []}
reduce: {type: text}
"#,
    );
    assert_eq!(required_vars(&config), vec!["title", "region"]);
}
