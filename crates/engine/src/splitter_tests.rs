// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fanout_core::FieldValue;
use std::io::Write;

fn items(titles: &[&str]) -> Vec<PipelineItem> {
    titles
        .iter()
        .map(|t| PipelineItem::from_pairs([("title", *t)]))
        .collect()
}

#[test]
fn inline_passes_items_through_in_order() {
    let produced = Splitter::inline(items(&["A", "B", "C"])).split().unwrap();
    assert_eq!(produced.len(), 3);
    assert_eq!(produced[0].get("title"), Some(&FieldValue::Text("A".into())));
    assert_eq!(produced[2].get("title"), Some(&FieldValue::Text("C".into())));
}

#[test]
fn limit_is_applied_after_production() {
    let produced = Splitter::inline(items(&["A", "B", "C"]))
        .with_limit(Some(2))
        .split()
        .unwrap();
    assert_eq!(produced.len(), 2);
    assert_eq!(produced[1].get("title"), Some(&FieldValue::Text("B".into())));
}

#[test]
fn parameters_merge_as_defaults() {
    let produced = Splitter::inline(vec![
        PipelineItem::from_pairs([("title", "x")]),
        PipelineItem::from_pairs([("title", "y"), ("env", "dev")]),
    ])
    .with_parameters([("env", "prod")])
    .split()
    .unwrap();

    assert_eq!(produced[0].get("env"), Some(&FieldValue::Text("prod".into())));
    // Item field wins over the parameter
    assert_eq!(produced[1].get("env"), Some(&FieldValue::Text("dev".into())));
}

#[test]
fn csv_source_reads_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("rows.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "id,title").unwrap();
    writeln!(file, "1,A").unwrap();
    writeln!(file, "2,B").unwrap();
    writeln!(file, "3,C").unwrap();

    let produced = Splitter::csv(&path, None).with_limit(Some(2)).split().unwrap();
    assert_eq!(produced.len(), 2);
    assert_eq!(produced[0].get("id"), Some(&FieldValue::Number(1.0)));
    assert_eq!(produced[1].get("title"), Some(&FieldValue::Text("B".into())));
}

#[test]
fn generate_refuses_to_produce() {
    let err = Splitter::generate("make items", vec!["title".into()])
        .split()
        .unwrap_err();
    assert!(matches!(err, SplitError::GenerateRequiresItems));
}

#[test]
fn provided_items_get_parameters_and_limit() {
    let produced = Splitter::provided(items(&["A", "B", "C"]))
        .with_parameters([("env", "prod")])
        .with_limit(Some(1))
        .split()
        .unwrap();
    assert_eq!(produced.len(), 1);
    assert_eq!(produced[0].get("env"), Some(&FieldValue::Text("prod".into())));
}

#[test]
fn generation_prompt_includes_schema_and_limit() {
    let splitter = Splitter::generate("Produce feature ideas", vec!["title".into(), "why".into()])
        .with_limit(Some(5));
    let prompt = splitter.generation_prompt().unwrap();
    assert!(prompt.starts_with("Produce feature ideas"));
    assert!(prompt.contains("at most 5"));
    assert!(prompt.contains("\"title\", \"why\""));

    assert!(Splitter::inline(vec![]).generation_prompt().is_none());
}
